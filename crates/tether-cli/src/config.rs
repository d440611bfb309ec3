//! Configuration management for the CLI
//!
//! Values are resolved from, in increasing precedence:
//! - Default values
//! - A configuration file (TOML, JSON or YAML)
//! - `TETHER_*` environment variables
//! - Command-line arguments (applied by the handlers)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tether_core::http::{RetryPolicy, TimeoutConfig};
use tether_core::{PinStrategy, UnpinnedPolicy};

const APP_DIR: &str = "tether";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of the file-backed credential store
    pub store_dir: PathBuf,

    /// Base URL used by `fetch` when `--base-url` is absent
    pub base_url: Option<String>,

    /// Additional attempts after a failed one
    pub retries: u32,

    /// Delay before the first retry in milliseconds; 0 retries immediately
    pub retry_delay_ms: u64,

    /// Strategy for stored pins not declared under `pins`
    pub default_strategy: PinStrategy,

    /// Treatment of hosts without a pin
    pub unpinned_policy: UnpinnedPolicy,

    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// Extra trust anchors (DER files) for platform evaluation
    pub root_certificates: Vec<PathBuf>,

    pub logging: LoggingSection,

    /// Pins declared per host
    pub pins: Vec<PinEntry>,
}

/// One `[[pins]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinEntry {
    pub host: String,
    #[serde(default = "default_strategy")]
    pub strategy: PinStrategy,
    /// DER certificate file; relative paths resolve against the config file
    pub certificate: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,
    /// Log format (compact, full, json)
    pub format: Option<String>,
    pub file: Option<PathBuf>,
}

fn default_strategy() -> PinStrategy {
    PinStrategy::Certificate
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            base_url: None,
            retries: 0,
            retry_delay_ms: 0,
            default_strategy: default_strategy(),
            unpinned_policy: UnpinnedPolicy::default(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            root_certificates: Vec::new(),
            logging: LoggingSection::default(),
            pins: Vec::new(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("pins")
}

/// Serialization format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Json,
    Yaml,
}

impl FileFormat {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Toml,
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// Relative certificate paths in `pins` are resolved against the
    /// directory holding the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut config: Config = match FileFormat::of(path) {
            FileFormat::Toml => toml::from_str(&content)?,
            FileFormat::Json => serde_json::from_str(&content)?,
            FileFormat::Yaml => serde_yaml::from_str(&content)?,
        };

        if let Some(base) = path.parent() {
            for pin in &mut config.pins {
                if pin.certificate.is_relative() {
                    pin.certificate = base.join(&pin.certificate);
                }
            }
        }

        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load from a specific file or default locations, then apply the environment
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::load()?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TETHER_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TETHER_STORE_DIR") {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("TETHER_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(retries) = lookup("TETHER_RETRIES") {
            self.retries = retries
                .parse()
                .map_err(|_| Error::config(format!("TETHER_RETRIES is not a number: {retries}")))?;
        }
        if let Some(policy) = lookup("TETHER_UNPINNED_POLICY") {
            self.unpinned_policy = match policy.as_str() {
                "deny" => UnpinnedPolicy::Deny,
                "platform-default" => UnpinnedPolicy::PlatformDefault,
                other => {
                    return Err(Error::config(format!(
                        "TETHER_UNPINNED_POLICY must be 'deny' or 'platform-default', got '{other}'"
                    )))
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be greater than zero"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::config("connect_timeout_secs must be greater than zero"));
        }
        if self.connect_timeout_secs > self.request_timeout_secs {
            return Err(Error::config(format!(
                "connect_timeout_secs ({}) must not exceed request_timeout_secs ({})",
                self.connect_timeout_secs, self.request_timeout_secs
            )));
        }

        let mut hosts: Vec<&str> = self.pins.iter().map(|pin| pin.host.as_str()).collect();
        hosts.sort_unstable();
        if let Some(pair) = hosts.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::config(format!("host '{}' is pinned more than once", pair[0])));
        }
        Ok(())
    }

    /// Strategy for `host`: its `[[pins]]` entry, else `fallback`
    pub fn strategy_for(&self, host: &str, fallback: PinStrategy) -> PinStrategy {
        self.pins
            .iter()
            .find(|pin| pin.host == host)
            .map(|pin| pin.strategy)
            .unwrap_or(fallback)
    }

    pub fn timeout(&self) -> TimeoutConfig {
        TimeoutConfig::default()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry_delay_ms == 0 {
            RetryPolicy::immediate()
        } else {
            RetryPolicy::exponential(self.retry_delay_ms)
        }
    }

    /// Default configuration file paths to check, in order
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".tether.toml"),
            PathBuf::from(".tether.yaml"),
            PathBuf::from(".tether.json"),
        ];

        if let Some(user_path) = Self::user_config_path() {
            paths.push(user_path.clone());
            paths.push(user_path.with_extension("yaml"));
            paths.push(user_path.with_extension("json"));
        }

        paths
    }

    /// `<config dir>/tether/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Whether `path` is read and written as TOML
    pub fn is_toml_path(path: &Path) -> bool {
        FileFormat::of(path) == FileFormat::Toml
    }

    /// Render in the format implied by `path`'s extension
    pub fn render_for(&self, path: &Path) -> Result<String> {
        match FileFormat::of(path) {
            FileFormat::Toml => self.to_toml(),
            FileFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            FileFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize as TOML: {}", e)))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.render_for(path)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_toml_pins_resolve_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(
            &path,
            r#"
base_url = "https://api.example.com"
retries = 2

[[pins]]
host = "api.example.com"
strategy = "public-key"
certificate = "certs/api.der"

[[pins]]
host = "cdn.example.com"
certificate = "/etc/pins/cdn.der"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.retries, 2);
        assert_eq!(config.pins.len(), 2);
        assert_eq!(config.pins[0].strategy, PinStrategy::PublicKey);
        assert_eq!(config.pins[0].certificate, dir.path().join("certs/api.der"));
        assert_eq!(config.pins[1].strategy, PinStrategy::Certificate);
        assert_eq!(config.pins[1].certificate, PathBuf::from("/etc/pins/cdn.der"));
        assert_eq!(config.unpinned_policy, UnpinnedPolicy::Deny);
    }

    #[test]
    fn test_yaml_and_json_are_equivalent() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("tether.yaml");
        let json = dir.path().join("tether.json");
        std::fs::write(&yaml, "retries: 3\nunpinned_policy: platform-default\n").unwrap();
        std::fs::write(&json, r#"{"retries": 3, "unpinned_policy": "platform-default"}"#).unwrap();

        let from_yaml = Config::from_file(&yaml).unwrap();
        let from_json = Config::from_file(&json).unwrap();

        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.unpinned_policy, UnpinnedPolicy::PlatformDefault);
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let result = Config::from_file(Path::new("/nonexistent/tether.toml"));
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TETHER_BASE_URL", "https://env.example.com"),
            ("TETHER_RETRIES", "4"),
            ("TETHER_UNPINNED_POLICY", "platform-default"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://env.example.com"));
        assert_eq!(config.retries, 4);
        assert_eq!(config.unpinned_policy, UnpinnedPolicy::PlatformDefault);

        let result = config.apply_env(|key| (key == "TETHER_RETRIES").then(|| "many".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_connect_timeout_longer_than_request_rejected() {
        let config = Config {
            connect_timeout_secs: 60,
            request_timeout_secs: 30,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            connect_timeout_secs: 30,
            request_timeout_secs: 30,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.timeout().validate().is_ok());
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let entry = PinEntry {
            host: "api.example.com".into(),
            strategy: PinStrategy::Certificate,
            certificate: PathBuf::from("a.der"),
        };
        let config = Config {
            pins: vec![entry.clone(), entry],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_strategy_lookup_and_policies() {
        let config = Config {
            pins: vec![PinEntry {
                host: "api.example.com".into(),
                strategy: PinStrategy::PublicKey,
                certificate: PathBuf::from("a.der"),
            }],
            retry_delay_ms: 25,
            ..Config::default()
        };

        assert_eq!(
            config.strategy_for("api.example.com", PinStrategy::Certificate),
            PinStrategy::PublicKey
        );
        assert_eq!(
            config.strategy_for("other.example.com", PinStrategy::Certificate),
            PinStrategy::Certificate
        );
        assert!(!config.retry_policy().is_immediate());
        assert!(Config::default().retry_policy().is_immediate());
        assert_eq!(config.timeout().request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_save_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            base_url: Some("https://api.example.com".into()),
            pins: vec![PinEntry {
                host: "api.example.com".into(),
                strategy: PinStrategy::PublicKey,
                certificate: dir.path().join("api.der"),
            }],
            ..Config::default()
        };

        config.save(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }
}
