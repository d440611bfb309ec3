//! Error types for the Tether core library
//!
//! This module defines the error taxonomy shared by the credential store,
//! the trust verifiers and client construction, using thiserror for
//! ergonomic error definitions and anyhow for flexible error contexts.
//!
//! Request-level failures returned by the HTTP engine live in
//! [`crate::http::ApiError`].

use thiserror::Error;

/// Main error type for client construction and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// TLS setup errors (root store, protocol versions, verifier construction)
    #[error("TLS error: {message}")]
    Tls {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// HTTP client construction errors
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Credential store errors
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error without an underlying cause
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

/// Failures of the local credential store
///
/// Verifiers turn either variant into a denied connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No record exists for the label
    #[error("no certificate registered under label '{label}'")]
    NotFound { label: String },

    /// The store refused the record or could not access its storage
    #[error("credential store failed for label '{label}': {reason}")]
    RegistrationFailed { label: String, reason: String },
}

impl CredentialError {
    pub(crate) fn registration(label: &str, reason: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(label: &str) -> Self {
        Self::NotFound {
            label: label.to_string(),
        }
    }
}

/// Reasons a pinning verifier denied or could not evaluate a challenge
///
/// Every variant resolves to "deny the connection". The variant is only
/// ever reported through logging, never through the network-facing error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinningError {
    /// The server presented an empty certificate chain
    #[error("server at '{host}' presented no certificate")]
    NoServerCertificate { host: String },

    /// The locally pinned certificate could not be decoded
    #[error("pinned certificate '{label}' is not valid DER X.509: {reason}")]
    MalformedStoredCertificate { label: String, reason: String },

    /// The server's leaf certificate could not be decoded
    #[error("leaf certificate presented by '{host}' is not valid DER X.509: {reason}")]
    MalformedServerCertificate { host: String, reason: String },

    /// The pin did not match or no pin material was available
    #[error("pin verification failed for '{host}': {reason}")]
    VerificationFailed { host: String, reason: String },

    /// Platform evaluation of the chain for the exact host name failed
    #[error("certificate chain is not trusted for host name '{host}'")]
    HostNameMismatch { host: String },
}

impl PinningError {
    pub(crate) fn verification_failed(host: &str, reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            host: host.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_error_display() {
        let err = CredentialError::not_found("api.example.com");
        assert!(err.to_string().contains("api.example.com"));

        let err = CredentialError::registration("api.example.com", "disk full");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_credential_error_converts_into_crate_error() {
        let err: Error = CredentialError::not_found("host").into();
        assert!(matches!(err, Error::Credential(CredentialError::NotFound { .. })));
    }

    #[test]
    fn test_pinning_error_names_host() {
        let err = PinningError::HostNameMismatch {
            host: "api.example.com".to_string(),
        };
        assert!(err.to_string().contains("api.example.com"));
    }
}
