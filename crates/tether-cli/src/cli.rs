//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use tether_core::PinStrategy;

/// Tether - pin TLS certificates and public keys per host
///
/// Manages a local store of pinned certificates and fetches resources
/// over connections that only succeed when the pin matches.
#[derive(Parser, Debug)]
#[command(
    name = "tether",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage pinned certificates in the local store
    Pin(PinArgs),

    /// Describe a DER certificate file
    Inspect(InspectArgs),

    /// GET a path from a pinned host and print the body
    Fetch(FetchArgs),

    /// Manage configuration files and settings
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct PinArgs {
    #[command(subcommand)]
    pub action: PinAction,
}

#[derive(Subcommand, Debug)]
pub enum PinAction {
    /// Register a certificate for a host
    Add(PinAddArgs),

    /// Forget the certificate registered for a host
    Remove(PinRemoveArgs),

    /// List every pinned host
    List,
}

#[derive(Parser, Debug)]
pub struct PinAddArgs {
    /// Host name the certificate is pinned for (exact match)
    #[arg(value_name = "HOST")]
    pub host: String,

    /// DER-encoded X.509 certificate
    #[arg(value_name = "CERT")]
    pub certificate: PathBuf,

    /// Replace a different certificate already pinned for the host
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct PinRemoveArgs {
    #[arg(value_name = "HOST")]
    pub host: String,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// DER-encoded X.509 certificate
    #[arg(value_name = "CERT")]
    pub certificate: PathBuf,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Path appended to the base URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Base URL of the server (overrides the configured one)
    #[arg(long, env = "TETHER_BASE_URL")]
    pub base_url: Option<String>,

    /// Additional attempts after the first failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Strategy for pins that do not declare one in the config file
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Fall back to platform trust for hosts without a pin
    #[arg(long)]
    pub allow_unpinned: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init(ConfigInitArgs),

    /// Show the effective configuration
    Show(ConfigShowArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigInitArgs {
    /// Where to write the file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Force overwrite existing config files
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: ConfigFormat,
}

/// Configuration file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Pinning strategy as spelled on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Exact certificate bytes
    Certificate,
    /// Public key only; survives certificate renewal with the same key
    PublicKey,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl From<Strategy> for PinStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Certificate => PinStrategy::Certificate,
            Strategy::PublicKey => PinStrategy::PublicKey,
        }
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_arguments() {
        let cli = Cli::parse_from([
            "tether",
            "fetch",
            "/iphone",
            "--base-url",
            "https://www.apple.com",
            "--retries",
            "2",
            "--strategy",
            "public-key",
            "--allow-unpinned",
        ]);

        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.path, "/iphone");
                assert_eq!(args.base_url.as_deref(), Some("https://www.apple.com"));
                assert_eq!(args.retries, Some(2));
                assert_eq!(args.strategy, Some(Strategy::PublicKey));
                assert!(args.allow_unpinned);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_pin_add_arguments() {
        let cli = Cli::parse_from(["tether", "pin", "add", "api.example.com", "leaf.der", "--force"]);

        match cli.command {
            Commands::Pin(PinArgs {
                action: PinAction::Add(args),
            }) => {
                assert_eq!(args.host, "api.example.com");
                assert_eq!(args.certificate, PathBuf::from("leaf.der"));
                assert!(args.force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbosity_level() {
        let cli = Cli::parse_from(["tether", "-vv", "pin", "list"]);
        assert_eq!(cli.verbosity_level(), 2);

        let cli = Cli::parse_from(["tether", "--quiet", "pin", "list"]);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_no_color_wins_over_terminal_detection() {
        let cli = Cli::parse_from(["tether", "--no-color", "pin", "list"]);
        assert!(!cli.use_color());
    }

    #[test]
    fn test_strategy_conversion() {
        assert_eq!(PinStrategy::from(Strategy::Certificate), PinStrategy::Certificate);
        assert_eq!(PinStrategy::from(Strategy::PublicKey), PinStrategy::PublicKey);
    }
}
