//! Request outcome taxonomy
//!
//! Maps transport failures and HTTP status codes onto [`ApiError`], the only
//! error type callers of the engine ever see.

use std::fmt;

use thiserror::Error;

/// Terminal failure of one `execute` call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The descriptor could not be turned into a request URL
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport failure (connect, reset, timeout, refused trust) or a 500
    #[error("request failed: {message}")]
    RequestFailed { status: Option<u16>, message: String },

    /// Any status other than 200, 401 and 500
    #[error("unexpected response status {status}")]
    UnexpectedResponse { status: u16 },

    /// The body did not decode into the requested type
    #[error("failed to parse JSON response: {0}")]
    JsonParsingFailure(String),

    /// The server answered 401
    #[error("authentication token was rejected")]
    InvalidToken,

    /// The body is not valid UTF-8 text
    #[error("response body is not valid UTF-8")]
    InvalidData,
}

impl ApiError {
    pub(crate) fn invalid_url(url: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestFailed { status, .. } => *status,
            ApiError::UnexpectedResponse { status } => Some(*status),
            ApiError::InvalidToken => Some(401),
            _ => None,
        }
    }
}

/// What went wrong below HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection setup failed, including TLS handshakes refused by trust policy
    Connect,
    /// The request or connect timeout elapsed
    Timeout,
    /// The response body could not be read
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Body => write!(f, "body"),
            TransportErrorKind::Other => write!(f, "transport"),
        }
    }
}

/// Failure reported by a [`Transport`](super::Transport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };

        // reqwest's top-level message hides the cause ("error sending request")
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self { kind, message }
    }
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        ApiError::request_failed(None, error.to_string())
    }
}

/// Classification of a received HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 200 only; other 2xx codes are unexpected
    Success,
    /// 401
    Unauthorized,
    /// 500 only
    ServerFault,
    Unexpected(u16),
}

impl ResponseClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => ResponseClass::Success,
            401 => ResponseClass::Unauthorized,
            500 => ResponseClass::ServerFault,
            other => ResponseClass::Unexpected(other),
        }
    }
}
