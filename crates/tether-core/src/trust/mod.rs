//! Trust verification for TLS server challenges
//!
//! This module provides:
//! - [`TrustChallenge`]: the borrowed view of one handshake's server trust
//! - [`TrustEvaluator`]: the platform chain/host-name evaluator seam
//! - [`Verifier`]: pluggable pinning strategies deciding accept or reject
//! - Shared primitives used by the strategies

pub mod certificate;
pub mod primitives;
pub mod public_key;
pub mod webpki;

pub use certificate::CertificateVerifier;
pub use primitives::{
    certificate_matches, fingerprint, hostname_trusted, CertificateSummary, PublicKeyInfo,
};
pub use public_key::PublicKeyVerifier;
pub use webpki::WebPkiEvaluator;

use std::fmt;

use rustls::pki_types::{CertificateDer, UnixTime};
use serde::{Deserialize, Serialize};

use crate::error::PinningError;

/// Evaluates a presented chain against the exact host name of a challenge
///
/// This is the platform's trust decision (chain building, validity dates,
/// extensions, name matching). Pinning strategies layer on top of it.
pub trait TrustEvaluator: Send + Sync + fmt::Debug {
    /// Succeeds when the chain is trusted for `challenge.host()`
    fn evaluate(&self, challenge: &TrustChallenge<'_>) -> Result<(), rustls::Error>;
}

/// One server-trust challenge raised during a TLS handshake
///
/// Borrowed for the duration of a single verification call.
pub struct TrustChallenge<'a> {
    host: &'a str,
    chain: Vec<CertificateDer<'a>>,
    ocsp_response: &'a [u8],
    now: UnixTime,
    evaluator: &'a dyn TrustEvaluator,
}

impl<'a> TrustChallenge<'a> {
    /// Create a challenge for `host` with the chain ordered leaf first
    pub fn new(
        host: &'a str,
        chain: Vec<CertificateDer<'a>>,
        evaluator: &'a dyn TrustEvaluator,
    ) -> Self {
        Self {
            host,
            chain,
            ocsp_response: &[],
            now: UnixTime::now(),
            evaluator,
        }
    }

    /// Attach the stapled OCSP response the server sent
    pub fn with_ocsp_response(mut self, ocsp_response: &'a [u8]) -> Self {
        self.ocsp_response = ocsp_response;
        self
    }

    /// Evaluate the chain at a fixed time instead of now
    pub fn at(mut self, now: UnixTime) -> Self {
        self.now = now;
        self
    }

    /// Host name the client is connecting to
    pub fn host(&self) -> &str {
        self.host
    }

    /// Full presented chain, leaf first
    pub fn certificates(&self) -> &[CertificateDer<'a>] {
        &self.chain
    }

    /// The server's own certificate, if any was presented
    pub fn leaf(&self) -> Option<&CertificateDer<'a>> {
        self.chain.first()
    }

    /// Certificates after the leaf
    pub fn intermediates(&self) -> &[CertificateDer<'a>] {
        self.chain.get(1..).unwrap_or(&[])
    }

    /// Stapled OCSP response, empty when none was sent
    pub fn ocsp_response(&self) -> &[u8] {
        self.ocsp_response
    }

    /// Time used for validity checks
    pub fn now(&self) -> UnixTime {
        self.now
    }

    /// Run the platform evaluator for this challenge
    pub fn evaluate(&self) -> Result<(), rustls::Error> {
        self.evaluator.evaluate(self)
    }

    /// Public key of the leaf certificate
    pub fn leaf_public_key(&self) -> Result<PublicKeyInfo, PinningError> {
        let leaf = self.leaf().ok_or_else(|| PinningError::NoServerCertificate {
            host: self.host.to_string(),
        })?;

        PublicKeyInfo::from_der(leaf.as_ref()).map_err(|reason| {
            PinningError::MalformedServerCertificate {
                host: self.host.to_string(),
                reason,
            }
        })
    }
}

impl fmt::Debug for TrustChallenge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustChallenge")
            .field("host", &self.host)
            .field("certificates", &self.chain.len())
            .field("ocsp_response", &self.ocsp_response.len())
            .finish()
    }
}

/// Pinning strategy a verifier implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinStrategy {
    /// Exact DER match of the leaf certificate
    Certificate,
    /// Equality of the leaf's public key
    PublicKey,
}

impl fmt::Display for PinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinStrategy::Certificate => write!(f, "certificate"),
            PinStrategy::PublicKey => write!(f, "public-key"),
        }
    }
}

/// Which checks of a verifier passed for one challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssessment {
    /// Platform evaluation for the exact host name succeeded
    pub hostname_trusted: bool,
    /// The strategy's pin (certificate bytes or public key) matched
    pub pin_matched: bool,
}

impl PinAssessment {
    /// Both the host name and the pin were verified
    pub fn is_trusted(&self) -> bool {
        self.hostname_trusted && self.pin_matched
    }

    /// Convert a denial into the error naming the failed check
    pub fn into_result(self, host: &str, strategy: PinStrategy) -> Result<(), PinningError> {
        if !self.hostname_trusted {
            Err(PinningError::HostNameMismatch {
                host: host.to_string(),
            })
        } else if !self.pin_matched {
            Err(PinningError::verification_failed(
                host,
                format!("{} pin does not match", strategy),
            ))
        } else {
            Ok(())
        }
    }
}

/// A pinning strategy consulted for a registered host
///
/// A verifier never reports "trusted" unless the host name check and its own
/// pin check both succeeded. Any step it cannot complete is an error, and
/// the caller treats errors as a denial.
pub trait Verifier: Send + Sync + fmt::Debug {
    /// Strategy implemented by this verifier
    fn strategy(&self) -> PinStrategy;

    /// Run every check and report which ones passed
    fn assess(&self, challenge: &TrustChallenge<'_>) -> Result<PinAssessment, PinningError>;

    /// Accept (`true`) or reject (`false`) the challenge
    fn verify(&self, challenge: &TrustChallenge<'_>) -> Result<bool, PinningError> {
        self.assess(challenge).map(|assessment| assessment.is_trusted())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_challenge_accessors() {
        let evaluator = FixedEvaluator(true);
        let chain = vec![CertificateDer::from(LEAF), CertificateDer::from(ROOT)];
        let challenge = TrustChallenge::new("api.example.com", chain, &evaluator);

        assert_eq!(challenge.host(), "api.example.com");
        assert_eq!(challenge.leaf().map(|c| c.as_ref()), Some(LEAF));
        assert_eq!(challenge.intermediates().len(), 1);
        assert!(challenge.ocsp_response().is_empty());
        assert!(challenge.evaluate().is_ok());
    }

    #[test]
    fn test_empty_chain_has_no_leaf() {
        let evaluator = FixedEvaluator(true);
        let challenge = TrustChallenge::new("api.example.com", Vec::new(), &evaluator);

        assert!(challenge.leaf().is_none());
        assert!(challenge.intermediates().is_empty());
        assert!(matches!(
            challenge.leaf_public_key(),
            Err(PinningError::NoServerCertificate { .. })
        ));
    }

    #[test]
    fn test_garbage_leaf_is_malformed() {
        let evaluator = FixedEvaluator(true);
        let chain = vec![CertificateDer::from(&b"not a certificate"[..])];
        let challenge = TrustChallenge::new("api.example.com", chain, &evaluator);

        assert!(matches!(
            challenge.leaf_public_key(),
            Err(PinningError::MalformedServerCertificate { .. })
        ));
    }

    #[test]
    fn test_assessment_requires_both_checks() {
        let both = PinAssessment { hostname_trusted: true, pin_matched: true };
        let host_only = PinAssessment { hostname_trusted: true, pin_matched: false };
        let pin_only = PinAssessment { hostname_trusted: false, pin_matched: true };

        assert!(both.is_trusted());
        assert!(!host_only.is_trusted());
        assert!(!pin_only.is_trusted());

        assert!(both.into_result("h", PinStrategy::Certificate).is_ok());
        assert!(matches!(
            host_only.into_result("h", PinStrategy::Certificate),
            Err(PinningError::VerificationFailed { .. })
        ));
        assert!(matches!(
            pin_only.into_result("h", PinStrategy::PublicKey),
            Err(PinningError::HostNameMismatch { .. })
        ));
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&PinStrategy::PublicKey).unwrap();
        assert_eq!(json, "\"public-key\"");
        assert_eq!(PinStrategy::Certificate.to_string(), "certificate");
    }
}
