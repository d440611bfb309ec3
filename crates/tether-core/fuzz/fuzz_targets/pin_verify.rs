//! Fuzzing target for pin verification
//!
//! Feeds arbitrary leaf bytes to both pinning strategies with the platform
//! check forced to succeed. Only the pinned certificate itself may pass the
//! certificate strategy, and neither strategy may panic.

#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use rustls::pki_types::CertificateDer;
use tether_core::trust::{TrustChallenge, TrustEvaluator};
use tether_core::{
    CertificateVerifier, CredentialStore, MemoryCredentialStore, PublicKeyVerifier, Verifier,
};

const HOST: &str = "api.example.com";
const LEAF: &[u8] = include_bytes!("../../tests/fixtures/leaf.der");

#[derive(Debug)]
struct TrustEverything;

impl TrustEvaluator for TrustEverything {
    fn evaluate(&self, _challenge: &TrustChallenge<'_>) -> Result<(), rustls::Error> {
        Ok(())
    }
}

fn verifiers() -> &'static (CertificateVerifier, PublicKeyVerifier) {
    static VERIFIERS: OnceLock<(CertificateVerifier, PublicKeyVerifier)> = OnceLock::new();
    VERIFIERS.get_or_init(|| {
        let store = Arc::new(MemoryCredentialStore::new());
        store.register(LEAF, HOST).unwrap();
        (
            CertificateVerifier::new(store.clone()),
            PublicKeyVerifier::new(store),
        )
    })
}

fuzz_target!(|data: &[u8]| {
    let (certificate, public_key) = verifiers();
    let evaluator = TrustEverything;
    let challenge = TrustChallenge::new(HOST, vec![CertificateDer::from(data.to_vec())], &evaluator);

    assert_eq!(certificate.verify(&challenge), Ok(data == LEAF));

    let _ = public_key.verify(&challenge);
});
