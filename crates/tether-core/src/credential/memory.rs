//! In-process credential store

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::{check_existing, check_record, CredentialStore};
use crate::error::CredentialError;

/// Credential store backed by a `HashMap`
///
/// Records live as long as the store. Useful for tests and for clients that
/// load their pins from bundled resources on every start.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn register(&self, certificate: &[u8], label: &str) -> Result<(), CredentialError> {
        check_record(certificate, label)?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if check_existing(records.get(label).map(Vec::as_slice), certificate, label)? {
            debug!(label, "certificate already registered");
            return Ok(());
        }

        records.insert(label.to_string(), certificate.to_vec());
        debug!(label, bytes = certificate.len(), "certificate registered");
        Ok(())
    }

    fn retrieve(&self, label: &str) -> Result<Vec<u8>, CredentialError> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned()
            .ok_or_else(|| CredentialError::not_found(label))
    }

    fn remove(&self, label: &str) -> Result<(), CredentialError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(label)
            .map(|_| ())
            .ok_or_else(|| CredentialError::not_found(label))
    }

    fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        labels.sort();
        labels
    }
}
