//! Label-keyed storage for locally trusted certificate material
//!
//! Verifiers look up the pinned DER certificate for a host by using the host
//! name as the label. Records are never mutated in place: rotating a pin is
//! `remove` followed by `register`.

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::error::CredentialError;

/// Storage backend for pinned certificates
///
/// Implementations must allow concurrent `retrieve` calls from TLS handshake
/// callbacks. `register` and `remove` are rare administrative operations and
/// may serialize.
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Store DER bytes under `label`
    ///
    /// Registering the same bytes twice succeeds. Registering different bytes
    /// under an existing label fails with `RegistrationFailed`.
    fn register(&self, certificate: &[u8], label: &str) -> Result<(), CredentialError>;

    /// Fetch the DER bytes stored under `label`
    ///
    /// `NotFound` only when no record exists; a record that exists but cannot
    /// be read is `RegistrationFailed`.
    fn retrieve(&self, label: &str) -> Result<Vec<u8>, CredentialError>;

    /// Delete the record stored under `label`
    fn remove(&self, label: &str) -> Result<(), CredentialError>;

    /// All labels currently stored, sorted
    fn labels(&self) -> Vec<String>;
}

/// Shared checks applied before a record is written
pub(crate) fn check_record(certificate: &[u8], label: &str) -> Result<(), CredentialError> {
    if label.is_empty() {
        return Err(CredentialError::registration(label, "label must not be empty"));
    }
    if certificate.is_empty() {
        return Err(CredentialError::registration(label, "certificate is empty"));
    }
    Ok(())
}

/// Decide what to do when a label already holds `existing`
///
/// Returns `Ok(true)` when the write can be skipped because the bytes are
/// identical.
pub(crate) fn check_existing(
    existing: Option<&[u8]>,
    certificate: &[u8],
    label: &str,
) -> Result<bool, CredentialError> {
    match existing {
        None => Ok(false),
        Some(bytes) if bytes == certificate => Ok(true),
        Some(_) => Err(CredentialError::registration(
            label,
            "a different certificate is already registered; remove it first",
        )),
    }
}
