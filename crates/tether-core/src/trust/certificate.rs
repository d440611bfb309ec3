//! Exact certificate pinning

use std::sync::Arc;

use tracing::debug;

use super::{certificate_matches, hostname_trusted, PinAssessment, PinStrategy, TrustChallenge, Verifier};
use crate::credential::CredentialStore;
use crate::error::PinningError;

/// Accepts a server only when its leaf certificate is byte-identical to the
/// certificate registered under the host's label
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    store: Arc<dyn CredentialStore>,
}

impl CertificateVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl Verifier for CertificateVerifier {
    fn strategy(&self) -> PinStrategy {
        PinStrategy::Certificate
    }

    fn assess(&self, challenge: &TrustChallenge<'_>) -> Result<PinAssessment, PinningError> {
        let host = challenge.host();
        let leaf = challenge
            .leaf()
            .ok_or_else(|| PinningError::NoServerCertificate {
                host: host.to_string(),
            })?;

        let pinned = self
            .store
            .retrieve(host)
            .map_err(|e| PinningError::verification_failed(host, e.to_string()))?;

        let assessment = PinAssessment {
            hostname_trusted: hostname_trusted(challenge),
            pin_matched: certificate_matches(leaf.as_ref(), &pinned),
        };
        debug!(host, ?assessment, "certificate pin assessed");
        Ok(assessment)
    }
}
