//! Public-key pinning
//!
//! Survives certificate renewal as long as the server keeps its key pair.

use std::sync::Arc;

use tracing::debug;

use super::{hostname_trusted, PinAssessment, PinStrategy, PublicKeyInfo, TrustChallenge, Verifier};
use crate::credential::CredentialStore;
use crate::error::PinningError;

/// Accepts a server when its leaf certificate carries the same public key as
/// the certificate registered under the host's label
#[derive(Debug, Clone)]
pub struct PublicKeyVerifier {
    store: Arc<dyn CredentialStore>,
}

impl PublicKeyVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    fn pinned_key(&self, host: &str) -> Result<PublicKeyInfo, PinningError> {
        let pinned = self
            .store
            .retrieve(host)
            .map_err(|e| PinningError::verification_failed(host, e.to_string()))?;

        PublicKeyInfo::from_der(&pinned).map_err(|reason| PinningError::MalformedStoredCertificate {
            label: host.to_string(),
            reason,
        })
    }
}

impl Verifier for PublicKeyVerifier {
    fn strategy(&self) -> PinStrategy {
        PinStrategy::PublicKey
    }

    fn assess(&self, challenge: &TrustChallenge<'_>) -> Result<PinAssessment, PinningError> {
        let host = challenge.host();
        let pinned = self.pinned_key(host)?;
        let presented = challenge.leaf_public_key()?;

        let assessment = PinAssessment {
            hostname_trusted: hostname_trusted(challenge),
            pin_matched: presented == pinned,
        };
        debug!(
            host,
            key = %presented.fingerprint(),
            ?assessment,
            "public key pin assessed"
        );
        Ok(assessment)
    }
}
