//! Pinned fetch handler

use super::{open_store, sync_config_pins};
use crate::cli::FetchArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use serde::Serialize;
use std::sync::Arc;
use tether_core::http::TlsConfig;
use tether_core::{
    CertificateVerifier, CredentialStore, Endpoint, Engine, EngineConfig, PinStrategy,
    PublicKeyVerifier, UnpinnedPolicy, Verifier, VerifierRegistry,
};
use tokio::sync::oneshot;

#[derive(Debug, Serialize)]
struct FetchResult<'a> {
    url: String,
    body: &'a str,
}

/// GET `args.path` from the base URL and print the body
pub async fn handle_fetch(args: FetchArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let engine_config = engine_config(&args, config)?;
    let retries = args.retries.unwrap_or(config.retries);

    let store = open_store(config)?;
    sync_config_pins(config, store.as_ref())?;
    let fallback = args.strategy.map(PinStrategy::from).unwrap_or(config.default_strategy);
    let registry = build_registry(config, store, fallback);

    if registry.is_empty() && engine_config.unpinned_policy == UnpinnedPolicy::Deny {
        output.warning("No pins are registered and unpinned hosts are denied; the request will be refused")?;
    }

    let url = format!("{}{}", engine_config.base_url.trim_end_matches('/'), args.path);
    let engine = Engine::new(engine_config, Arc::new(registry))?;

    let spinner = output.spinner(&format!("Fetching {url}"));
    let (tx, rx) = oneshot::channel();
    let handle = engine.spawn_text(Endpoint::get(args.path.clone()), retries, move |result| {
        let _ = tx.send(result);
    });

    let outcome = tokio::select! {
        result = rx => result.map_err(|_| Error::other("request task ended without a result")),
        _ = tokio::signal::ctrl_c() => {
            if handle.cancel() {
                tracing::info!("Request cancelled");
            }
            Err(Error::Interrupted)
        }
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let body = outcome??;
    if output.is_human() {
        output.write(&body)
    } else {
        output.data(&FetchResult { url, body: &body })
    }
}

fn engine_config(args: &FetchArgs, config: &Config) -> Result<EngineConfig> {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| config.base_url.clone())
        .ok_or_else(|| Error::invalid_args("no base URL; pass --base-url or set base_url in the config file"))?;

    let unpinned_policy = if args.allow_unpinned {
        UnpinnedPolicy::PlatformDefault
    } else {
        config.unpinned_policy
    };

    let tls = config
        .root_certificates
        .iter()
        .fold(TlsConfig::default(), |tls, path| tls.with_root_certificate_file(path));

    Ok(EngineConfig::new(base_url)
        .with_retry_policy(config.retry_policy())
        .with_timeout(config.timeout())
        .with_tls(tls)
        .with_unpinned_policy(unpinned_policy))
}

/// One verifier per stored pin, using the configured or fallback strategy
fn build_registry(
    config: &Config,
    store: Arc<dyn CredentialStore>,
    fallback: PinStrategy,
) -> VerifierRegistry {
    let registry = VerifierRegistry::new();
    for host in store.labels() {
        let strategy = config.strategy_for(&host, fallback);
        let verifier: Arc<dyn Verifier> = match strategy {
            PinStrategy::Certificate => Arc::new(CertificateVerifier::new(store.clone())),
            PinStrategy::PublicKey => Arc::new(PublicKeyVerifier::new(store.clone())),
        };
        tracing::debug!(host = %host, strategy = %strategy, "Pin loaded");
        registry.register(host, verifier);
    }
    registry
}
