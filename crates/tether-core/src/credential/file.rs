//! Durable credential store rooted at a directory
//!
//! Each record is a single `<hex(label)>.der` file holding the raw DER
//! certificate. Hex-encoding the label keeps arbitrary labels (host names,
//! IP literals) safe to use as file names.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, warn};

use super::{check_existing, check_record, CredentialStore};
use crate::error::{CredentialError, Error, Result};

const RECORD_EXTENSION: &str = "der";

/// Credential store persisting records as files
///
/// Records survive process restarts, so `register` is safe to call on every
/// startup. Writes go to a temporary file first and are renamed into place.
#[derive(Debug)]
pub struct FileCredentialStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::io(format!("Failed to create credential directory {}", root.display()), e)
        })?;

        debug!(root = %root.display(), "opened credential store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the records
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, label: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex::encode(label.as_bytes()), RECORD_EXTENSION))
    }

    fn read_record(&self, label: &str) -> std::result::Result<Option<Vec<u8>>, std::io::Error> {
        match fs::read(self.record_path(label)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_record(&self, label: &str, certificate: &[u8]) -> std::io::Result<()> {
        let target = self.record_path(label);
        let temp = target.with_extension(format!("{}.tmp", RECORD_EXTENSION));

        let mut file = fs::File::create(&temp)?;
        file.write_all(certificate)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target)
    }
}

impl CredentialStore for FileCredentialStore {
    fn register(&self, certificate: &[u8], label: &str) -> std::result::Result<(), CredentialError> {
        check_record(certificate, label)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self
            .read_record(label)
            .map_err(|e| CredentialError::registration(label, e.to_string()))?;
        if check_existing(existing.as_deref(), certificate, label)? {
            debug!(label, "certificate already registered");
            return Ok(());
        }

        self.write_record(label, certificate)
            .map_err(|e| CredentialError::registration(label, e.to_string()))?;
        debug!(label, bytes = certificate.len(), "certificate persisted");
        Ok(())
    }

    fn retrieve(&self, label: &str) -> std::result::Result<Vec<u8>, CredentialError> {
        match self.read_record(label) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(CredentialError::not_found(label)),
            Err(e) => {
                error!(label, error = %e, "failed to read pinned certificate");
                Err(CredentialError::registration(label, e.to_string()))
            }
        }
    }

    fn remove(&self, label: &str) -> std::result::Result<(), CredentialError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(self.record_path(label)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CredentialError::not_found(label)),
            Err(e) => {
                error!(label, error = %e, "failed to remove pinned certificate");
                Err(CredentialError::registration(label, e.to_string()))
            }
        }
    }

    fn labels(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "failed to list credential store");
                return Vec::new();
            }
        };

        let mut labels: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let bytes = hex::decode(stem).ok()?;
                String::from_utf8(bytes).ok()
            })
            .collect();
        labels.sort();
        labels
    }
}
