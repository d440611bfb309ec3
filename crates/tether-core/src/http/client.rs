//! Request engine orchestrating descriptors, transport, retry and decoding
//!
//! Provides a high-level interface for making pinned, retryable HTTP requests

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{ApiError, ResponseClass};
use super::handle::{Completion, RequestHandle};
use super::request::RequestDescriptor;
use super::retry::{execute_with_retry, RetryPolicy, Retryable};
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;
use super::transport::{RawResponse, ReqwestTransport, Transport};
use crate::error::{Error, Result};
use crate::registry::{UnpinnedPolicy, VerifierRegistry};

/// How text-mode responses treat bodies that are not UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDecoding {
    /// Invalid UTF-8 yields an empty string
    #[default]
    Lenient,
    /// Invalid UTF-8 yields `ApiError::InvalidData`
    Strict,
}

/// Configuration for the request engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL every descriptor path is appended to
    pub base_url: String,
    /// Delay schedule between retries
    pub retry_policy: RetryPolicy,
    pub timeout: TimeoutConfig,
    pub tls: TlsConfig,
    /// Treatment of hosts without a registered verifier
    pub unpinned_policy: UnpinnedPolicy,
    pub text_decoding: TextDecoding,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            retry_policy: RetryPolicy::default(),
            timeout: TimeoutConfig::default(),
            tls: TlsConfig::default(),
            unpinned_policy: UnpinnedPolicy::default(),
            text_decoding: TextDecoding::default(),
            user_agent: format!("tether/{}", crate::VERSION),
        }
    }
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_unpinned_policy(mut self, policy: UnpinnedPolicy) -> Self {
        self.unpinned_policy = policy;
        self
    }

    pub fn with_text_decoding(mut self, decoding: TextDecoding) -> Self {
        self.text_decoding = decoding;
        self
    }

    /// Validate everything except the base URL
    ///
    /// An unusable base URL is reported per request as `InvalidUrl`.
    pub fn validate(&self) -> Result<()> {
        self.timeout.validate().map_err(Error::configuration)?;
        self.retry_policy.validate().map_err(Error::configuration)?;
        self.tls.validate().map_err(|e| Error::Configuration {
            message: e.to_string(),
            source: Some(e.into()),
        })?;
        Ok(())
    }
}

type RefreshHook = Arc<dyn Fn() + Send + Sync>;

/// Why one attempt ended without a value
enum AttemptError {
    Failed(ApiError),
    Cancelled,
}

impl From<ApiError> for AttemptError {
    fn from(error: ApiError) -> Self {
        AttemptError::Failed(error)
    }
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Failed(_))
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(error) => error.fmt(f),
            AttemptError::Cancelled => f.write_str("request cancelled"),
        }
    }
}

/// Pinned HTTP request engine
///
/// Cheap to clone; clones share the transport, registry and refresh hook.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    transport: Arc<dyn Transport>,
    registry: Option<Arc<VerifierRegistry>>,
    refresh_token: Option<RefreshHook>,
}

impl Engine {
    /// Create an engine whose TLS handshakes are checked against `registry`
    pub fn new(config: EngineConfig, registry: Arc<VerifierRegistry>) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::pinned(&config, registry.clone())?;

        info!(
            base_url = %config.base_url,
            pinned_hosts = registry.len(),
            unpinned = %config.unpinned_policy,
            "request engine ready"
        );
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            registry: Some(registry),
            refresh_token: None,
        })
    }

    /// Create an engine over an arbitrary transport
    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            registry: None,
            refresh_token: None,
        }
    }

    /// Install the hook run synchronously on every 401 response
    pub fn with_refresh_token<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.refresh_token = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry consulted during handshakes, when the engine owns the TLS stack
    pub fn registry(&self) -> Option<&Arc<VerifierRegistry>> {
        self.registry.as_ref()
    }

    /// Execute and return the body as text
    pub async fn execute_text<D>(&self, descriptor: &D, retries: u32) -> std::result::Result<String, ApiError>
    where
        D: RequestDescriptor + ?Sized,
    {
        let decoding = self.config.text_decoding;
        self.execute_with(descriptor, retries, None, move |body| decode_text(body, decoding))
            .await
    }

    /// Execute and decode the JSON body into `T`
    pub async fn execute_json<T, D>(&self, descriptor: &D, retries: u32) -> std::result::Result<T, ApiError>
    where
        T: DeserializeOwned,
        D: RequestDescriptor + ?Sized,
    {
        self.execute_with(descriptor, retries, None, decode_json::<T>).await
    }

    /// Run `execute_text` in the background and report through `on_complete`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_text<D, F>(&self, descriptor: D, retries: u32, on_complete: F) -> RequestHandle
    where
        D: RequestDescriptor + 'static,
        F: FnOnce(std::result::Result<String, ApiError>) + Send + 'static,
    {
        let decoding = self.config.text_decoding;
        self.spawn_with(descriptor, retries, on_complete, move |body| decode_text(body, decoding))
    }

    /// Run `execute_json` in the background and report through `on_complete`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_json<T, D, F>(&self, descriptor: D, retries: u32, on_complete: F) -> RequestHandle
    where
        T: DeserializeOwned + Send + 'static,
        D: RequestDescriptor + 'static,
        F: FnOnce(std::result::Result<T, ApiError>) + Send + 'static,
    {
        self.spawn_with(descriptor, retries, on_complete, decode_json::<T>)
    }

    fn spawn_with<T, D, F, P>(&self, descriptor: D, retries: u32, on_complete: F, decode: P) -> RequestHandle
    where
        T: Send + 'static,
        D: RequestDescriptor + 'static,
        F: FnOnce(std::result::Result<T, ApiError>) + Send + 'static,
        P: Fn(Vec<u8>) -> std::result::Result<T, ApiError> + Send + Sync + 'static,
    {
        let engine = self.clone();
        let completion = Completion::default();
        let task_completion = completion.clone();

        let task = tokio::spawn(async move {
            let result = engine
                .execute_with(&descriptor, retries, Some(&task_completion), decode)
                .await;
            if task_completion.try_deliver() {
                on_complete(result);
            } else {
                debug!("request cancelled, result dropped");
            }
        });

        RequestHandle::new(completion, task)
    }

    async fn execute_with<T, D, P>(
        &self,
        descriptor: &D,
        retries: u32,
        completion: Option<&Completion>,
        decode: P,
    ) -> std::result::Result<T, ApiError>
    where
        D: RequestDescriptor + ?Sized,
        P: Fn(Vec<u8>) -> std::result::Result<T, ApiError>,
    {
        let request = descriptor.to_request(&self.config.base_url)?;
        let decode = &decode;

        let outcome = execute_with_retry(
            |attempt| {
                let request = request.clone();
                async move {
                    if completion.is_some_and(Completion::is_cancelled) {
                        return Err(AttemptError::Cancelled);
                    }
                    debug!(attempt, method = %request.method, url = %request.url, "attempt started");

                    let response = self.transport.send(request).await.map_err(ApiError::from)?;
                    let body = self.classify(response)?;
                    Ok(decode(body)?)
                }
            },
            retries,
            &self.config.retry_policy,
        )
        .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(AttemptError::Failed(error)) => Err(error),
            Err(AttemptError::Cancelled) => Err(ApiError::request_failed(None, "request cancelled")),
        }
    }

    fn classify(&self, response: RawResponse) -> std::result::Result<Vec<u8>, ApiError> {
        match ResponseClass::from_status(response.status) {
            ResponseClass::Success => Ok(response.body),
            ResponseClass::Unauthorized => {
                if let Some(refresh) = &self.refresh_token {
                    refresh();
                }
                Err(ApiError::InvalidToken)
            }
            ResponseClass::ServerFault => Err(ApiError::request_failed(
                Some(response.status),
                "server error",
            )),
            ResponseClass::Unexpected(status) => Err(ApiError::UnexpectedResponse { status }),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("registry", &self.registry)
            .field("refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

fn decode_text(body: Vec<u8>, decoding: TextDecoding) -> std::result::Result<String, ApiError> {
    match (String::from_utf8(body), decoding) {
        (Ok(text), _) => Ok(text),
        (Err(_), TextDecoding::Strict) => Err(ApiError::InvalidData),
        (Err(e), TextDecoding::Lenient) => {
            warn!(error = %e, "response body is not UTF-8, returning empty text");
            Ok(String::new())
        }
    }
}

fn decode_json<T: DeserializeOwned>(body: Vec<u8>) -> std::result::Result<T, ApiError> {
    serde_json::from_slice(&body).map_err(|e| ApiError::JsonParsingFailure(e.to_string()))
}
