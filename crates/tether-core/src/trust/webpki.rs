//! Platform trust evaluation backed by `webpki`

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::RootCertStore;
use tracing::debug;

use super::{TrustChallenge, TrustEvaluator};
use crate::error::{Error, Result};

/// Chain and host-name evaluation against a root store
///
/// Wraps rustls' `WebPkiServerVerifier`, so chain building, validity dates,
/// key usage and name matching follow the same rules as an unpinned client.
#[derive(Clone)]
pub struct WebPkiEvaluator {
    inner: Arc<WebPkiServerVerifier>,
    roots: usize,
}

impl WebPkiEvaluator {
    /// Build an evaluator trusting the bundled Mozilla roots plus `extra_roots`
    pub fn new(provider: Arc<CryptoProvider>, extra_roots: &[Vec<u8>]) -> Result<Self> {
        Self::with_roots(provider, true, extra_roots)
    }

    /// Build an evaluator, optionally without the bundled roots
    pub fn with_roots(
        provider: Arc<CryptoProvider>,
        use_webpki_roots: bool,
        extra_roots: &[Vec<u8>],
    ) -> Result<Self> {
        let mut store = RootCertStore::empty();
        if use_webpki_roots {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for der in extra_roots {
            store
                .add(CertificateDer::from(der.as_slice()))
                .map_err(|e| Error::Tls {
                    message: "Failed to add trust root".to_string(),
                    source: Some(e.into()),
                })?;
        }

        if store.is_empty() {
            return Err(Error::configuration(
                "No trust roots configured: enable webpki roots or add root certificates",
            ));
        }

        let roots = store.len();
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(store), provider)
            .build()
            .map_err(|e| Error::Tls {
                message: "Failed to build certificate verifier".to_string(),
                source: Some(e.into()),
            })?;

        debug!(roots, "platform trust evaluator ready");
        Ok(Self { inner, roots })
    }

    /// Number of trust anchors in the root store
    pub fn root_count(&self) -> usize {
        self.roots
    }
}

impl fmt::Debug for WebPkiEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPkiEvaluator")
            .field("roots", &self.roots)
            .finish()
    }
}

impl TrustEvaluator for WebPkiEvaluator {
    fn evaluate(&self, challenge: &TrustChallenge<'_>) -> std::result::Result<(), rustls::Error> {
        let leaf = challenge
            .leaf()
            .ok_or(rustls::Error::NoCertificatesPresented)?;
        let name = ServerName::try_from(challenge.host())
            .map_err(|_| rustls::Error::General(format!("invalid host name: {}", challenge.host())))?;

        self.inner
            .verify_server_cert(
                leaf,
                challenge.intermediates(),
                &name,
                challenge.ocsp_response(),
                challenge.now(),
            )
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::testing::*;
    use rustls::pki_types::UnixTime;
    use std::time::Duration;

    fn evaluator() -> WebPkiEvaluator {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        WebPkiEvaluator::with_roots(provider, false, &[ROOT.to_vec()]).unwrap()
    }

    fn at_2030() -> UnixTime {
        UnixTime::since_unix_epoch(Duration::from_secs(1_900_000_000))
    }

    #[test]
    fn test_trusts_leaf_for_its_host() {
        let evaluator = evaluator();
        let challenge =
            TrustChallenge::new("api.example.com", vec![CertificateDer::from(LEAF)], &evaluator)
                .at(at_2030());

        assert!(challenge.evaluate().is_ok());
        assert_eq!(evaluator.root_count(), 1);
    }

    #[test]
    fn test_rejects_other_host() {
        let evaluator = evaluator();
        let challenge =
            TrustChallenge::new("www.example.org", vec![CertificateDer::from(LEAF)], &evaluator)
                .at(at_2030());

        assert!(challenge.evaluate().is_err());
    }

    #[test]
    fn test_rejects_untrusted_issuer() {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let evaluator = WebPkiEvaluator::new(provider, &[]).unwrap();
        let challenge =
            TrustChallenge::new("api.example.com", vec![CertificateDer::from(LEAF)], &evaluator)
                .at(at_2030());

        assert!(challenge.evaluate().is_err());
    }

    #[test]
    fn test_empty_chain_and_bad_roots() {
        let evaluator = evaluator();
        let challenge = TrustChallenge::new("api.example.com", Vec::new(), &evaluator);
        assert!(challenge.evaluate().is_err());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        assert!(WebPkiEvaluator::with_roots(provider.clone(), false, &[]).is_err());
        assert!(WebPkiEvaluator::with_roots(provider, false, &[b"junk".to_vec()]).is_err());
    }
}
