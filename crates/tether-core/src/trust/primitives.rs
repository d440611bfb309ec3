//! Checks shared by the pinning strategies

use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::prelude::*;

use super::TrustChallenge;

/// Whether the platform trusts the challenge's chain for its exact host name
///
/// Chain building, validity dates, extensions and name matching are all
/// delegated to the challenge's evaluator. Any evaluation error is `false`.
pub fn hostname_trusted(challenge: &TrustChallenge<'_>) -> bool {
    match challenge.evaluate() {
        Ok(()) => true,
        Err(error) => {
            debug!(host = challenge.host(), %error, "platform trust evaluation failed");
            false
        }
    }
}

/// Byte-for-byte equality of two DER certificates
///
/// Differing lengths are a mismatch before any content is compared.
pub fn certificate_matches(presented: &[u8], pinned: &[u8]) -> bool {
    if presented.len() != pinned.len() {
        return false;
    }
    presented.iter().zip(pinned).all(|(a, b)| a == b)
}

/// Lowercase hex SHA-256 of a DER blob
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Subject public key of a certificate, compared structurally
///
/// Two keys are equal when their algorithm identifier (OID and parameters)
/// and key bits are identical, i.e. when the DER of the SubjectPublicKeyInfo
/// is identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    algorithm: String,
    spki: Vec<u8>,
}

impl PublicKeyInfo {
    /// Extract the public key from a DER-encoded X.509 certificate
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, certificate) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
        let spki = certificate.public_key();

        Ok(Self {
            algorithm: spki.algorithm.algorithm.to_id_string(),
            spki: spki.raw.to_vec(),
        })
    }

    /// Dotted OID of the key algorithm
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// DER encoding of the SubjectPublicKeyInfo
    pub fn spki_der(&self) -> &[u8] {
        &self.spki
    }

    /// Lowercase hex SHA-256 of the SubjectPublicKeyInfo
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.spki)
    }
}

/// Human-facing description of a DER certificate
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
    pub key_algorithm: String,
    /// SHA-256 of the whole certificate
    pub fingerprint: String,
    /// SHA-256 of the SubjectPublicKeyInfo
    pub public_key_fingerprint: String,
}

impl CertificateSummary {
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, certificate) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
        let key = PublicKeyInfo::from_der(der)?;

        let dns_names = match certificate.subject_alternative_name() {
            Ok(Some(extension)) => extension
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => return Err(e.to_string()),
        };

        Ok(Self {
            subject: certificate.subject().to_string(),
            issuer: certificate.issuer().to_string(),
            not_before: certificate.validity().not_before.to_string(),
            not_after: certificate.validity().not_after.to_string(),
            dns_names,
            key_algorithm: key.algorithm().to_string(),
            fingerprint: fingerprint(der),
            public_key_fingerprint: key.fingerprint(),
        })
    }

    /// Whether the certificate names `host` in its subject alternative names
    ///
    /// Exact, case-insensitive match; wildcards are not expanded.
    pub fn names_host(&self, host: &str) -> bool {
        self.dns_names.iter().any(|name| name.eq_ignore_ascii_case(host))
    }
}
