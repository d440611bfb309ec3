//! Error types and handling for the CLI
//!
//! Every failure maps to a distinct process exit code.

use std::io;
use std::path::PathBuf;
use tether_core::{ApiError, CredentialError};

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Client construction or configuration rejected by tether-core
    #[error("{0}")]
    Core(#[from] tether_core::Error),

    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// The request engine gave up
    #[error("{0}")]
    Request(#[from] ApiError),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A file that should hold a DER certificate does not
    #[error("{} is not a DER-encoded X.509 certificate: {}", path.display(), reason)]
    InvalidCertificate { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Ctrl-C while a request was in flight
    #[error("Interrupted")]
    Interrupted,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Core(_) => 2,
            Self::FileNotFound { .. } => 3,
            Self::InvalidCertificate { .. } => 4,
            Self::Config(_) => 5,
            Self::InvalidArgs(_) => 6,
            Self::Credential(CredentialError::NotFound { .. }) => 7,
            Self::Credential(CredentialError::RegistrationFailed { .. }) => 8,
            Self::Request(error) => request_exit_code(error),
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::Toml(_) => 14,
            Self::Interrupted => 130,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

fn request_exit_code(error: &ApiError) -> i32 {
    match error {
        ApiError::InvalidUrl { .. } => 20,
        ApiError::RequestFailed { .. } => 21,
        ApiError::UnexpectedResponse { .. } => 22,
        ApiError::JsonParsingFailure(_) => 23,
        ApiError::InvalidToken => 24,
        ApiError::InvalidData => 25,
    }
}

/// Extension trait for attaching context to fallible operations
pub trait ErrorContext<T> {
    /// Add context with a closure (only evaluated on error)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other {
                message: format!("{}: {}", f(), inner),
            }
        })
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), error)
    } else {
        format!("Error: {}", error)
    }
}
