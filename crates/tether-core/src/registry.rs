//! Host to verifier mapping consulted on every TLS challenge

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::trust::Verifier;

/// What to do with a challenge from a host that has no registered verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnpinnedPolicy {
    /// Refuse the connection
    #[default]
    Deny,
    /// Accept whatever the platform trust evaluator accepts
    PlatformDefault,
}

impl fmt::Display for UnpinnedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnpinnedPolicy::Deny => write!(f, "deny"),
            UnpinnedPolicy::PlatformDefault => write!(f, "platform-default"),
        }
    }
}

/// Mapping of exact host names to the verifier responsible for them
///
/// Lookups are exact string matches: no wildcards, no suffix matching, no
/// case folding. Registering a host twice replaces the earlier verifier.
#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: RwLock<HashMap<String, Arc<dyn Verifier>>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration used while assembling a client
    pub fn with_verifier(self, host: impl Into<String>, verifier: Arc<dyn Verifier>) -> Self {
        self.register(host, verifier);
        self
    }

    /// Register `verifier` for `host`, returning the verifier it replaced
    pub fn register(
        &self,
        host: impl Into<String>,
        verifier: Arc<dyn Verifier>,
    ) -> Option<Arc<dyn Verifier>> {
        let host = host.into();
        info!(host = %host, strategy = %verifier.strategy(), "verifier registered");
        self.verifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host, verifier)
    }

    /// Verifier registered for exactly `host`
    pub fn lookup(&self, host: &str) -> Option<Arc<dyn Verifier>> {
        self.verifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// Drop the verifier for `host`
    pub fn remove(&self, host: &str) -> Option<Arc<dyn Verifier>> {
        self.verifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host)
    }

    /// Registered hosts, sorted
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .verifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        hosts.sort();
        hosts
    }

    pub fn len(&self) -> usize {
        self.verifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierRegistry")
            .field("hosts", &self.hosts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MemoryCredentialStore;
    use crate::trust::{CertificateVerifier, PinStrategy, PublicKeyVerifier};

    fn store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::new())
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = VerifierRegistry::new()
            .with_verifier("api.example.com", Arc::new(CertificateVerifier::new(store())));

        assert!(registry.lookup("api.example.com").is_some());
        assert!(registry.lookup("API.example.com").is_none());
        assert!(registry.lookup("www.api.example.com").is_none());
        assert!(registry.lookup("example.com").is_none());
        assert!(registry.lookup("unknown.example.com").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = VerifierRegistry::new();
        assert!(registry
            .register("api.example.com", Arc::new(CertificateVerifier::new(store())))
            .is_none());

        let replaced =
            registry.register("api.example.com", Arc::new(PublicKeyVerifier::new(store())));
        assert_eq!(replaced.map(|v| v.strategy()), Some(PinStrategy::Certificate));

        let current = registry.lookup("api.example.com").unwrap();
        assert_eq!(current.strategy(), PinStrategy::PublicKey);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_hosts() {
        let registry = VerifierRegistry::new()
            .with_verifier("b.example.com", Arc::new(CertificateVerifier::new(store())))
            .with_verifier("a.example.com", Arc::new(CertificateVerifier::new(store())));

        assert_eq!(registry.hosts(), vec!["a.example.com", "b.example.com"]);
        assert!(registry.remove("a.example.com").is_some());
        assert!(registry.remove("a.example.com").is_none());
        assert_eq!(registry.hosts(), vec!["b.example.com"]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_unpinned_policy_defaults_to_deny() {
        assert_eq!(UnpinnedPolicy::default(), UnpinnedPolicy::Deny);
        let policy: UnpinnedPolicy = serde_json::from_str("\"platform-default\"").unwrap();
        assert_eq!(policy, UnpinnedPolicy::PlatformDefault);
        assert_eq!(policy.to_string(), "platform-default");
    }
}
