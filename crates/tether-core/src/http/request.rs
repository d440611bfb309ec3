//! Request descriptors and their materialization into concrete requests

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use super::error::ApiError;
use super::transport::PreparedRequest;

/// HTTP methods a descriptor can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// Immutable description of one request, relative to the engine's base URL
///
/// Only `path` is required. The URL is the base URL's path with `path`
/// appended verbatim, so `path` normally starts with `/`.
pub trait RequestDescriptor: Send + Sync {
    fn path(&self) -> &str;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    /// Sent as the `Content-Type` header on every request
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn headers(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    fn query(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    /// JSON body, serialized as-is
    fn body(&self) -> Option<&Value> {
        None
    }

    /// Materialize against `base_url`
    fn to_request(&self, base_url: &str) -> Result<PreparedRequest, ApiError> {
        let url = join_url(base_url, self.path(), self.query())?;

        let mut headers = HeaderMap::new();
        if let Some(custom) = self.headers() {
            for (name, value) in custom {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => warn!(header = %name, "skipping invalid request header"),
                }
            }
        }
        match HeaderValue::from_str(self.content_type()) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => warn!(content_type = self.content_type(), "skipping invalid content type"),
        }

        let body = self
            .body()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::JsonParsingFailure(e.to_string()))?;

        Ok(PreparedRequest {
            method: self.method().as_reqwest(),
            url,
            headers,
            body,
        })
    }
}

/// Build the request URL from a base URL, a path and query parameters
///
/// The base must be an absolute `http`/`https` URL with a host. Any query
/// already on the base URL is kept and `query` is appended to it.
pub fn join_url(
    base_url: &str,
    path: &str,
    query: Option<&BTreeMap<String, String>>,
) -> Result<Url, ApiError> {
    let mut url = Url::parse(base_url).map_err(|e| ApiError::invalid_url(base_url, e))?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ApiError::invalid_url(base_url, "base URL must be hierarchical with a host"));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::invalid_url(
            base_url,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
    url.set_path(&joined);

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Ok(url)
}

/// Plain-data request descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl Endpoint {
    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::get(path).with_method(HttpMethod::Post)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl RequestDescriptor for Endpoint {
    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("application/json")
    }

    fn headers(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.headers)
    }

    fn query(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.query)
    }

    fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
