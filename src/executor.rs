//! transport seam
//!
//! the client and the server handler never talk to the network directly; they
//! hand an [`OutgoingRequest`] to a [`RequestExecutor`]. [`ReqwestExecutor`]
//! is the default implementation.

use crate::config::ClientConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use url::Url;

/// a request ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: Method,
    /// full url, query string included
    pub url: Url,
    pub headers: HeaderMap,
    /// json body, sent for non-GET requests
    pub body: Option<serde_json::Value>,
    /// per-request timeout overriding the executor default
    pub timeout: Option<Duration>,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }
}

/// per-call transport settings merged into an outgoing request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub headers: HeaderMap,
    /// extra query parameters
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// merge into `request`; headers already set on the request are replaced
    pub fn apply(&self, request: &mut OutgoingRequest) {
        for (name, value) in &self.headers {
            request.headers.insert(name.clone(), value.clone());
        }
        if !self.query.is_empty() {
            request.url.query_pairs_mut().extend_pairs(&self.query);
        }
        if self.timeout.is_some() {
            request.timeout = self.timeout;
        }
    }
}

/// status, headers and body text of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    /// response with empty headers
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// sends requests; implementations decide the transport
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: OutgoingRequest) -> Result<RawResponse>;
}

/// rewrites a request after the cache key was computed and before dispatch
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: OutgoingRequest) -> OutgoingRequest;
}

/// sees every successful raw response before it is decoded
pub trait ResponseObserver: Send + Sync {
    fn on_response(&self, response: &RawResponse);
}

/// executor backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    http: reqwest::Client,
}

impl ReqwestExecutor {
    /// build an executor from the client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if let Some(http) = &config.http_client {
            return Ok(Self::from_client(http.clone()));
        }

        let builder = reqwest::Client::builder()
            .default_headers(config.extra_headers.clone())
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout);

        let http = builder.build()?;
        Ok(Self { http })
    }

    /// wrap a prebuilt http client
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: OutgoingRequest) -> Result<RawResponse> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
