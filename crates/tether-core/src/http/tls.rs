//! TLS configuration and server-trust dispatch
//!
//! Every handshake of a pinned client goes through [`PinnedServerVerifier`],
//! which looks the host up in the [`VerifierRegistry`] and lets the
//! registered verifier decide. Refusals are uniform on the wire; the precise
//! reason is only logged.

use std::path::PathBuf;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, PinningError, Result};
use crate::registry::{UnpinnedPolicy, VerifierRegistry};
use crate::trust::{PinStrategy, TrustChallenge, TrustEvaluator, WebPkiEvaluator};

/// Message of the error returned for every refused handshake
pub const TRUST_POLICY_REFUSAL: &str = "connection refused by trust policy";

/// TLS/HTTPS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Minimum TLS version to accept
    pub min_tls_version: TlsVersion,
    /// Extra trust anchors, as DER certificate files
    pub root_certificates: Vec<PathBuf>,
    /// Extra trust anchors supplied in memory (DER)
    #[serde(skip)]
    pub root_certificates_der: Vec<Vec<u8>>,
    /// Trust the bundled Mozilla root program
    pub use_webpki_roots: bool,
    /// Refuse plain `http://` URLs
    pub https_only: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_tls_version: TlsVersion::Tls12,
            root_certificates: Vec::new(),
            root_certificates_der: Vec::new(),
            use_webpki_roots: true,
            https_only: true,
        }
    }
}

/// TLS protocol versions supported by rustls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    fn protocol_versions(self) -> Vec<&'static SupportedProtocolVersion> {
        match self {
            TlsVersion::Tls12 => rustls::DEFAULT_VERSIONS.to_vec(),
            TlsVersion::Tls13 => vec![&rustls::version::TLS13],
        }
    }
}

impl TlsConfig {
    /// Add a trust anchor from a DER file
    pub fn with_root_certificate_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificates.push(path.into());
        self
    }

    /// Add a trust anchor from DER bytes
    pub fn with_root_certificate_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.root_certificates_der.push(der.into());
        self
    }

    /// Enable or disable the bundled roots
    pub fn with_webpki_roots(mut self, enabled: bool) -> Self {
        self.use_webpki_roots = enabled;
        self
    }

    pub fn with_min_tls_version(mut self, version: TlsVersion) -> Self {
        self.min_tls_version = version;
        self
    }

    pub fn with_https_only(mut self, https_only: bool) -> Self {
        self.https_only = https_only;
        self
    }

    /// Validate the TLS configuration
    pub fn validate(&self) -> std::result::Result<(), TlsConfigError> {
        for path in &self.root_certificates {
            if !path.exists() {
                return Err(TlsConfigError::RootCertificateNotFound(path.clone()));
            }
        }

        if !self.use_webpki_roots
            && self.root_certificates.is_empty()
            && self.root_certificates_der.is_empty()
        {
            return Err(TlsConfigError::NoTrustRoots);
        }

        Ok(())
    }

    /// Read every configured extra root into memory
    pub fn load_root_certificates(&self) -> Result<Vec<Vec<u8>>> {
        let mut roots = self.root_certificates_der.clone();
        for path in &self.root_certificates {
            let der = std::fs::read(path).map_err(|e| {
                Error::io(format!("Failed to read root certificate {}", path.display()), e)
            })?;
            roots.push(der);
        }
        Ok(roots)
    }
}

/// TLS configuration errors
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("Root certificate file not found: {0:?}")]
    RootCertificateNotFound(PathBuf),

    #[error("No trust roots: enable webpki roots or configure root certificates")]
    NoTrustRoots,
}

/// Outcome of dispatching one trust challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// The registered verifier accepted the server
    Pinned(PinStrategy),
    /// No verifier registered; the platform evaluator accepted the server
    PlatformTrusted,
    /// No verifier registered and unpinned hosts are denied
    Unpinned,
    /// No verifier registered and the platform evaluator refused the server
    PlatformRejected(String),
    /// The registered verifier refused the server or failed
    Rejected(PinningError),
}

impl TrustDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TrustDecision::Pinned(_) | TrustDecision::PlatformTrusted)
    }
}

/// rustls verifier dispatching each challenge to the host's registered verifier
#[derive(Debug)]
pub struct PinnedServerVerifier {
    registry: Arc<VerifierRegistry>,
    evaluator: Arc<dyn TrustEvaluator>,
    policy: UnpinnedPolicy,
    provider: Arc<CryptoProvider>,
}

impl PinnedServerVerifier {
    pub fn new(
        registry: Arc<VerifierRegistry>,
        evaluator: Arc<dyn TrustEvaluator>,
        policy: UnpinnedPolicy,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            registry,
            evaluator,
            policy,
            provider,
        }
    }

    /// Decide a challenge: at most one verifier is consulted, by exact host
    pub fn decide(&self, challenge: &TrustChallenge<'_>) -> TrustDecision {
        let host = challenge.host();

        let Some(verifier) = self.registry.lookup(host) else {
            return match self.policy {
                UnpinnedPolicy::Deny => TrustDecision::Unpinned,
                UnpinnedPolicy::PlatformDefault => match challenge.evaluate() {
                    Ok(()) => TrustDecision::PlatformTrusted,
                    Err(e) => TrustDecision::PlatformRejected(e.to_string()),
                },
            };
        };

        let strategy = verifier.strategy();
        let outcome = verifier
            .assess(challenge)
            .and_then(|assessment| assessment.into_result(host, strategy));
        match outcome {
            Ok(()) => TrustDecision::Pinned(strategy),
            Err(e) => TrustDecision::Rejected(e),
        }
    }

    /// The evaluator used for platform trust decisions
    pub fn evaluator(&self) -> &Arc<dyn TrustEvaluator> {
        &self.evaluator
    }
}

fn host_of(server_name: &ServerName<'_>) -> std::result::Result<String, rustls::Error> {
    match server_name {
        ServerName::DnsName(name) => Ok(name.as_ref().to_string()),
        ServerName::IpAddress(ip) => Ok(std::net::IpAddr::from(*ip).to_string()),
        other => Err(rustls::Error::General(format!(
            "unsupported server name: {:?}",
            other
        ))),
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let host = host_of(server_name)?;

        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        let challenge = TrustChallenge::new(&host, chain, self.evaluator.as_ref())
            .with_ocsp_response(ocsp_response)
            .at(now);

        match self.decide(&challenge) {
            decision if decision.is_accepted() => {
                debug!(host = %host, ?decision, "server trust accepted");
                Ok(ServerCertVerified::assertion())
            }
            TrustDecision::Rejected(error) => {
                warn!(host = %host, %error, "server trust rejected");
                Err(rustls::Error::General(TRUST_POLICY_REFUSAL.to_string()))
            }
            decision => {
                warn!(host = %host, ?decision, "server trust rejected for unpinned host");
                Err(rustls::Error::General(TRUST_POLICY_REFUSAL.to_string()))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// The crypto provider used for handshakes and signature checks
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a rustls client configuration that dispatches trust to `registry`
pub fn pinned_tls_config(
    tls: &TlsConfig,
    registry: Arc<VerifierRegistry>,
    policy: UnpinnedPolicy,
) -> Result<ClientConfig> {
    tls.validate().map_err(|e| Error::Tls {
        message: e.to_string(),
        source: None,
    })?;

    let provider = crypto_provider();
    let roots = tls.load_root_certificates()?;
    let evaluator = WebPkiEvaluator::with_roots(provider.clone(), tls.use_webpki_roots, &roots)?;
    let verifier = PinnedServerVerifier::new(registry, Arc::new(evaluator), policy, provider.clone());

    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&tls.min_tls_version.protocol_versions())
        .map_err(|e| Error::Tls {
            message: "Unsupported TLS protocol versions".to_string(),
            source: Some(e.into()),
        })?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}
