//! Tether CLI - manage certificate pins and fetch over pinned TLS
//!
//! This is the main entry point for the `tether` binary, providing commands
//! for maintaining the local pin store, inspecting certificates, and
//! fetching resources from pinned hosts.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LoggingConfig};
use output::OutputWriter;
use std::process;
use tracing::Instrument;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    // Config errors are reported after logging is up
    let config = Config::load_with_file(cli.config.as_deref());

    if let Err(e) = init_logging(&cli, config.as_ref().ok()) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    let result = match config {
        Ok(config) => {
            let timer = Timer::new("cli_execution");
            let span = timer.span().clone();
            run(cli, config).instrument(span).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);

    tracing::info!(
        command = ?cli.command,
        verbosity = cli.verbosity_level(),
        store = %config.store_dir.display(),
        "Executing command"
    );

    match cli.command {
        Commands::Pin(args) => handlers::handle_pin(args, &config, &mut output).await,
        Commands::Inspect(args) => handlers::handle_inspect(args, &mut output).await,
        Commands::Fetch(args) => handlers::handle_fetch(args, &config, &mut output).await,
        Commands::Config(args) => handlers::handle_config(args, &config, &mut output).await,
        Commands::Completions(args) => handlers::handle_completions(args),
    }
}

/// Initialize the logging system from flags, the config file and the environment
fn init_logging(cli: &Cli, config: Option<&Config>) -> anyhow::Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());

    if let Some(config) = config {
        logging_config.merge_with_file(&config.logging, cli.verbosity_level());
    }
    logging_config.merge_with_env();

    // If quiet mode, only log errors
    if cli.quiet {
        logging_config.level = "error".to_string();
        logging_config.console = false;
    }

    logging::init_logging(logging_config)
}
