//! HTTP transport
//!
//! This module defines the `Transport` seam the scheduler fetches through and
//! its reqwest-backed implementation, including:
//! - Building HTTP clients with the configured user agent, redirect limit and compression
//! - Per-request timeout, user agent and header overrides
//! - Error classification (timeout, connect, other)
//!
//! Retries are not the transport's concern; the scheduler owns the retry budget.

use crate::config::TransportConfig;
use crate::TransportError;
use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client, Method};
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Opaque request payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Params {
    #[default]
    None,
    /// Key/value pairs: a query string for GET/HEAD, a urlencoded body otherwise
    Form(Vec<(String, String)>),
    /// Raw request body
    Raw(String),
}

/// Per-request overrides of the transport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOverrides {
    pub decode: Option<bool>,
    pub follow: Option<usize>,
    pub compressed: Option<bool>,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Everything a transport needs for one exchange
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub params: Params,
    pub options: TransportOverrides,
}

/// A raw response: status, headers and body bytes
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Declared `Content-Type`, if present and valid UTF-8
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Performs one network exchange
///
/// Implementations follow redirects, decompress and enforce timeouts as their
/// options say; a timeout is reported as an ordinary error.
pub trait Transport {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<Response, TransportError>>;
}

/// Builds an HTTP client with the given configuration
///
/// # Arguments
///
/// * `config` - The transport configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::config::TransportConfig;
/// use ripple_crawl::crawler::build_http_client;
///
/// let client = build_http_client(&TransportConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    let redirect = if config.follow == 0 {
        Policy::none()
    } else {
        Policy::limited(config.follow)
    };

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .gzip(config.compressed)
        .brotli(config.compressed)
        .build()
}

/// Transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client =
            build_http_client(&config).map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Client for the given overrides
    ///
    /// Redirect and compression settings live on the client, so a request that
    /// overrides them gets a dedicated one.
    fn client_for(&self, options: &TransportOverrides) -> Result<Client, TransportError> {
        let follow = options.follow.unwrap_or(self.config.follow);
        let compressed = options.compressed.unwrap_or(self.config.compressed);

        if follow == self.config.follow && compressed == self.config.compressed {
            return Ok(self.client.clone());
        }

        let config = TransportConfig {
            follow,
            compressed,
            ..self.config.clone()
        };
        build_http_client(&config).map_err(|e| TransportError::Client(e.to_string()))
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<Response, TransportError> {
        let FetchRequest {
            method,
            url,
            params,
            options,
        } = request;

        let client = self.client_for(&options)?;
        let carries_query = method == Method::GET || method == Method::HEAD;
        let mut builder = client.request(method, url.clone());

        builder = match params {
            Params::None => builder,
            Params::Form(pairs) if carries_query => builder.query(&pairs),
            Params::Form(pairs) => builder.form(&pairs),
            Params::Raw(body) => builder.body(body),
        };

        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.header(USER_AGENT, user_agent.as_str());
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::trace!("Sending request to {}", url);
        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = if options.decode.unwrap_or(self.config.decode) {
            // Decodes using the charset from Content-Type, falling back to UTF-8
            response.text().await.map_err(classify)?.into_bytes()
        } else {
            response.bytes().await.map_err(classify)?.to_vec()
        };

        tracing::trace!("Received {} ({} bytes) from {}", status, body.len(), url);
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Classifies a reqwest error the way the scheduler reports it
fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Http(error)
    }
}
