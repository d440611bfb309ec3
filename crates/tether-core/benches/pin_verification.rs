//! Benchmarks for the work done inside a TLS handshake
//!
//! Every pinned handshake runs one verifier synchronously, so these numbers
//! bound the latency pinning adds to a connection.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustls::pki_types::{CertificateDer, UnixTime};
use tether_core::http::tls::crypto_provider;
use tether_core::http::PinnedServerVerifier;
use tether_core::trust::{certificate_matches, PublicKeyInfo, TrustChallenge, TrustEvaluator, WebPkiEvaluator};
use tether_core::{
    CertificateVerifier, CredentialStore, MemoryCredentialStore, PublicKeyVerifier, UnpinnedPolicy,
    Verifier, VerifierRegistry,
};

const HOST: &str = "api.example.com";
const LEAF: &[u8] = include_bytes!("../tests/fixtures/leaf.der");
const LEAF_ROTATED: &[u8] = include_bytes!("../tests/fixtures/leaf_rotated.der");
const ROOT: &[u8] = include_bytes!("../tests/fixtures/ca.der");

#[derive(Debug)]
struct TrustEverything;

impl TrustEvaluator for TrustEverything {
    fn evaluate(&self, _challenge: &TrustChallenge<'_>) -> Result<(), rustls::Error> {
        Ok(())
    }
}

fn store() -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store.register(LEAF, HOST).expect("fixture registers");
    store
}

fn fixture_time() -> UnixTime {
    UnixTime::since_unix_epoch(Duration::from_secs(1_900_000_000))
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("certificate_matches", |b| {
        b.iter(|| certificate_matches(black_box(LEAF), black_box(LEAF)))
    });

    group.bench_function("public_key_from_der", |b| {
        b.iter(|| PublicKeyInfo::from_der(black_box(LEAF)))
    });

    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategies");
    let evaluator = TrustEverything;
    let certificate = CertificateVerifier::new(store());
    let public_key = PublicKeyVerifier::new(store());

    group.bench_function("certificate_pin", |b| {
        b.iter(|| {
            let challenge = TrustChallenge::new(HOST, vec![CertificateDer::from(LEAF)], &evaluator);
            certificate.verify(black_box(&challenge))
        })
    });

    group.bench_function("public_key_pin_rotated", |b| {
        b.iter(|| {
            let challenge = TrustChallenge::new(HOST, vec![CertificateDer::from(LEAF_ROTATED)], &evaluator);
            public_key.verify(black_box(&challenge))
        })
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let provider = crypto_provider();
    let webpki = Arc::new(
        WebPkiEvaluator::with_roots(provider.clone(), false, &[ROOT.to_vec()]).expect("fixture root loads"),
    );
    let registry = VerifierRegistry::new().with_verifier(HOST, Arc::new(PublicKeyVerifier::new(store())));
    let dispatcher = PinnedServerVerifier::new(Arc::new(registry), webpki.clone(), UnpinnedPolicy::Deny, provider);

    c.bench_function("dispatch_with_platform_evaluation", |b| {
        b.iter(|| {
            let challenge = TrustChallenge::new(HOST, vec![CertificateDer::from(LEAF)], webpki.as_ref())
                .at(fixture_time());
            dispatcher.decide(black_box(&challenge))
        })
    });
}

criterion_group!(benches, bench_primitives, bench_strategies, bench_dispatch);
criterion_main!(benches);
