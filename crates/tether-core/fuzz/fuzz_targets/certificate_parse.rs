//! Fuzzing target for certificate decoding
//!
//! Server certificates are attacker-controlled. Decoding them must return
//! an error on garbage, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_core::trust::{fingerprint, CertificateSummary, PublicKeyInfo};

fuzz_target!(|data: &[u8]| {
    if let Ok(key) = PublicKeyInfo::from_der(data) {
        // A key that decodes has a stable fingerprint
        assert_eq!(key.fingerprint(), fingerprint(key.spki_der()));
    }

    let _ = CertificateSummary::from_der(data);
});
