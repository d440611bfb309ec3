//! The network seam of the engine
//!
//! The engine only needs "send this request, give me the status and body".
//! [`ReqwestTransport`] does that over a pinned rustls connection; tests swap
//! in scripted transports.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::debug;
use url::Url;

use super::client::EngineConfig;
use super::error::TransportError;
use super::tls::pinned_tls_config;
use crate::error::{Error, Result};
use crate::registry::VerifierRegistry;

/// Fully-formed request ready to send
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Status and body of a received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one request and reads the whole response
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: PreparedRequest) -> std::result::Result<RawResponse, TransportError>;
}

/// Transport over a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an already configured client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client whose every TLS handshake is dispatched to `registry`
    pub fn pinned(config: &EngineConfig, registry: Arc<VerifierRegistry>) -> Result<Self> {
        let tls = pinned_tls_config(&config.tls, registry, config.unpinned_policy)?;

        let builder = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .https_only(config.tls.https_only)
            .user_agent(config.user_agent.as_str());
        let client = config
            .timeout
            .apply(builder)
            .build()
            .map_err(|e| Error::HttpClient {
                message: "Failed to create HTTP client".to_string(),
                source: Some(e),
            })?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> std::result::Result<RawResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(status, bytes = body.len(), "response received");
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
