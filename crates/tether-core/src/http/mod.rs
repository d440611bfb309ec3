//! Pinned HTTP request engine
//!
//! This module provides:
//! - Request descriptors materialized against a base URL
//! - A transport seam with a reqwest/rustls implementation
//! - TLS trust dispatch through the verifier registry
//! - Status classification into [`ApiError`]
//! - Bounded, sequential retry with optional backoff
//! - Background execution with cancellation

pub mod client;
pub mod error;
pub mod handle;
pub mod request;
pub mod retry;
pub mod timeout;
pub mod tls;
pub mod transport;

pub use client::{Engine, EngineConfig, TextDecoding};
pub use error::{ApiError, ResponseClass, TransportError, TransportErrorKind};
pub use handle::RequestHandle;
pub use request::{join_url, Endpoint, HttpMethod, RequestDescriptor};
pub use retry::{execute_with_retry, RetryDecision, RetryHandler, RetryPolicy, Retryable};
pub use timeout::TimeoutConfig;
pub use tls::{
    pinned_tls_config, PinnedServerVerifier, TlsConfig, TlsConfigError, TlsVersion, TrustDecision,
    TRUST_POLICY_REFUSAL,
};
pub use transport::{PreparedRequest, RawResponse, ReqwestTransport, Transport};
