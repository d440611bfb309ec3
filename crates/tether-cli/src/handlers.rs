//! Command handlers for CLI subcommands
//!
//! This module contains the implementation logic for each CLI subcommand
//! plus the pieces they share: certificate loading and the pin store.

mod completions;
mod config;
mod fetch;
mod inspect;
mod pin;

pub use completions::handle_completions;
pub use config::handle_config;
pub use fetch::handle_fetch;
pub use inspect::handle_inspect;
pub use pin::handle_pin;

use crate::config::Config;
use crate::error::{Error, ErrorContext, Result};
use std::path::Path;
use std::sync::Arc;
use tether_core::trust::CertificateSummary;
use tether_core::{CredentialError, CredentialStore, FileCredentialStore};

/// Read a DER certificate file and make sure it parses
pub(crate) fn read_certificate(path: &Path) -> Result<(Vec<u8>, CertificateSummary)> {
    let der = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    let summary = CertificateSummary::from_der(&der).map_err(|reason| Error::InvalidCertificate {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok((der, summary))
}

/// Open the file-backed pin store named by the configuration
pub(crate) fn open_store(config: &Config) -> Result<Arc<FileCredentialStore>> {
    let store = FileCredentialStore::open(&config.store_dir)
        .with_context(|| format!("opening pin store at {}", config.store_dir.display()))?;
    Ok(Arc::new(store))
}

/// Register every `[[pins]]` entry in `store`
///
/// Re-registering the same certificate is a no-op, so this runs on every
/// invocation. A different certificate already stored for the host is an
/// error until the user removes it.
pub(crate) fn sync_config_pins(config: &Config, store: &dyn CredentialStore) -> Result<()> {
    for pin in &config.pins {
        let (der, _) = read_certificate(&pin.certificate)?;
        match store.register(&der, &pin.host) {
            Ok(()) => tracing::debug!(host = %pin.host, strategy = %pin.strategy, "Configured pin registered"),
            Err(error @ CredentialError::RegistrationFailed { .. }) => {
                return Err(Error::config(format!(
                    "{error}; run 'tether pin remove {}' to replace it",
                    pin.host
                )))
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}
