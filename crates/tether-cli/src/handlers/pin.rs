//! Pin store command handlers

use super::{open_store, read_certificate};
use crate::cli::{PinAction, PinAddArgs, PinArgs, PinRemoveArgs};
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputWriter;
use serde::Serialize;
use tether_core::trust::{fingerprint, CertificateSummary};
use tether_core::{CredentialError, CredentialStore};

/// One row of `pin list`
#[derive(Debug, Serialize)]
struct PinRecord {
    host: String,
    strategy: String,
    fingerprint: String,
    not_after: Option<String>,
}

pub async fn handle_pin(args: PinArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        PinAction::Add(add) => handle_pin_add(add, config, output),
        PinAction::Remove(remove) => handle_pin_remove(remove, config, output),
        PinAction::List => handle_pin_list(config, output),
    }
}

fn handle_pin_add(args: PinAddArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let (der, summary) = read_certificate(&args.certificate)?;
    let store = open_store(config)?;

    if !summary.names_host(&args.host) {
        output.warning(&format!(
            "{} does not list '{}' among its DNS names; handshakes will fail host-name validation",
            args.certificate.display(),
            args.host
        ))?;
    }

    match store.register(&der, &args.host) {
        Ok(()) => {}
        Err(CredentialError::RegistrationFailed { .. }) if args.force => {
            tracing::info!(host = %args.host, "Replacing pinned certificate");
            store.remove(&args.host)?;
            store.register(&der, &args.host)?;
        }
        Err(error) => return Err(error.into()),
    }

    output.success(&format!("✓ Pinned {} ({})", args.host, summary.fingerprint))?;
    if !output.is_human() {
        output.data(&record(&args.host, config, &der))?;
    }
    Ok(())
}

fn handle_pin_remove(args: PinRemoveArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let store = open_store(config)?;
    store.remove(&args.host)?;

    if config.pins.iter().any(|pin| pin.host == args.host) {
        output.warning(&format!(
            "'{}' is still declared in the configuration file and will be pinned again on the next fetch",
            args.host
        ))?;
    }
    output.success(&format!("✓ Removed pin for {}", args.host))
}

fn handle_pin_list(config: &Config, output: &mut OutputWriter) -> Result<()> {
    let store = open_store(config)?;
    let mut records = Vec::new();

    for host in store.labels() {
        match store.retrieve(&host) {
            Ok(der) => records.push(record(&host, config, &der)),
            // Removed concurrently
            Err(CredentialError::NotFound { .. }) => continue,
            Err(error) => return Err(error.into()),
        }
    }

    if !output.is_human() {
        return output.data(&records);
    }

    if records.is_empty() {
        return output.info(&format!("No pins in {}", config.store_dir.display()));
    }

    let rows: Vec<Vec<String>> = records
        .into_iter()
        .map(|r| {
            vec![
                r.host,
                r.strategy,
                r.fingerprint[..16].to_string(),
                r.not_after.unwrap_or_else(|| "unreadable".to_string()),
            ]
        })
        .collect();
    output.table(&["HOST", "STRATEGY", "SHA-256", "EXPIRES"], &rows)
}

fn record(host: &str, config: &Config, der: &[u8]) -> PinRecord {
    PinRecord {
        host: host.to_string(),
        strategy: config.strategy_for(host, config.default_strategy).to_string(),
        fingerprint: fingerprint(der),
        not_after: CertificateSummary::from_der(der).ok().map(|s| s.not_after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tether_core::FileCredentialStore;

    const LEAF: &[u8] = include_bytes!("../../../tether-core/tests/fixtures/leaf.der");
    const LEAF_ROTATED: &[u8] = include_bytes!("../../../tether-core/tests/fixtures/leaf_rotated.der");

    struct Workspace {
        dir: TempDir,
        config: Config,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = Config {
                store_dir: dir.path().join("store"),
                ..Config::default()
            };
            Self { dir, config }
        }

        fn certificate(&self, name: &str, der: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, der).unwrap();
            path
        }

        fn store(&self) -> FileCredentialStore {
            FileCredentialStore::open(&self.config.store_dir).unwrap()
        }
    }

    fn quiet_output() -> OutputWriter {
        OutputWriter::with_writer(OutputFormat::Human, false, true, Box::new(std::io::sink()))
    }

    fn add(host: &str, certificate: PathBuf, force: bool) -> PinAddArgs {
        PinAddArgs {
            host: host.to_string(),
            certificate,
            force,
        }
    }

    #[test]
    fn test_add_then_remove() {
        let ws = Workspace::new();
        let leaf = ws.certificate("leaf.der", LEAF);
        let mut output = quiet_output();

        handle_pin_add(add("api.example.com", leaf, false), &ws.config, &mut output).unwrap();
        assert_eq!(ws.store().retrieve("api.example.com").unwrap(), LEAF.to_vec());

        let remove = PinRemoveArgs {
            host: "api.example.com".into(),
        };
        handle_pin_remove(remove, &ws.config, &mut output).unwrap();
        assert!(ws.store().labels().is_empty());
    }

    #[test]
    fn test_conflicting_add_requires_force() {
        let ws = Workspace::new();
        let leaf = ws.certificate("leaf.der", LEAF);
        let rotated = ws.certificate("rotated.der", LEAF_ROTATED);
        let mut output = quiet_output();

        handle_pin_add(add("api.example.com", leaf, false), &ws.config, &mut output).unwrap();

        let refused = handle_pin_add(add("api.example.com", rotated.clone(), false), &ws.config, &mut output);
        assert!(matches!(
            refused,
            Err(crate::error::Error::Credential(CredentialError::RegistrationFailed { .. }))
        ));

        handle_pin_add(add("api.example.com", rotated, true), &ws.config, &mut output).unwrap();
        assert_eq!(ws.store().retrieve("api.example.com").unwrap(), LEAF_ROTATED.to_vec());
    }

    #[test]
    fn test_remove_unknown_host_fails() {
        let ws = Workspace::new();
        let remove = PinRemoveArgs {
            host: "nobody.example.com".into(),
        };
        let result = handle_pin_remove(remove, &ws.config, &mut quiet_output());
        assert_eq!(result.unwrap_err().exit_code(), 7);
    }

    #[test]
    fn test_record_uses_configured_strategy() {
        let mut ws = Workspace::new();
        ws.config.default_strategy = tether_core::PinStrategy::PublicKey;

        let record = record("api.example.com", &ws.config, LEAF);
        assert_eq!(record.strategy, "public-key");
        assert_eq!(record.fingerprint, fingerprint(LEAF));
        assert!(record.not_after.is_some());
    }
}
