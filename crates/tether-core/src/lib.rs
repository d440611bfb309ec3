//! Tether Core - HTTP client with certificate and public-key pinning
//!
//! This crate lets a client decide for itself which TLS servers to trust,
//! on top of (never instead of) platform chain and host-name validation.
//!
//! # Main Components
//!
//! - **Credential Store**: label-keyed storage of pinned DER certificates
//! - **Trust Verifiers**: exact-certificate and public-key pinning strategies
//! - **Verifier Registry**: per-host verifier lookup used during handshakes
//! - **Request Engine**: request execution with typed errors, retry and cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_core::credential::{CredentialStore, MemoryCredentialStore};
//! use tether_core::http::{Endpoint, Engine, EngineConfig};
//! use tether_core::trust::CertificateVerifier;
//! use tether_core::VerifierRegistry;
//!
//! # async fn example(pinned_der: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryCredentialStore::new());
//! store.register(pinned_der, "www.example.com")?;
//!
//! let registry = VerifierRegistry::new()
//!     .with_verifier("www.example.com", Arc::new(CertificateVerifier::new(store)));
//! let engine = Engine::new(EngineConfig::new("https://www.example.com"), Arc::new(registry))?;
//!
//! let page = engine.execute_text(&Endpoint::get("/iphone"), 0).await?;
//! println!("{page}");
//! # Ok(())
//! # }
//! ```

pub mod credential;
pub mod error;
pub mod http;
pub mod registry;
pub mod trust;

pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{CredentialError, Error, PinningError, Result};
pub use http::{ApiError, Endpoint, Engine, EngineConfig, RequestDescriptor, RequestHandle};
pub use registry::{UnpinnedPolicy, VerifierRegistry};
pub use trust::{
    CertificateVerifier, PinStrategy, PublicKeyVerifier, TrustChallenge, TrustEvaluator, Verifier,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
