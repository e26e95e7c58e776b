//! The pluggable HTTP capability the orchestrator calls once per attempt.
//!
//! [`HttpTransport`] talks to the real service through `reqwest`;
//! [`MockTransport`](crate::mock::MockTransport) answers from programmed
//! replies for tests.

use crate::{metadata::TransportRequest, Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::time::Duration;
use url::Url;

/// The raw outcome of one HTTP call, before decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body as text.
    pub body: String,
}

/// Performs a single HTTP call.
///
/// Implementations must not retry; retries and the timeout budget are the
/// orchestrator's job. An `Err` means no response arrived at all (connection
/// refused, DNS failure, per-attempt timeout).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` to the service rooted at `endpoint`.
    async fn send(&self, endpoint: &Url, request: TransportRequest) -> Result<RawResponse>;
}

/// The production transport, backed by a pooled `reqwest::Client`.
///
/// # Examples
///
/// ```no_run
/// use shipping_api::HttpTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), shipping_api::Error> {
/// let transport = HttpTransport::new()?
///     .with_timeout(Duration::from_secs(20))
///     .with_default_header("User-Agent", "my-shop/2.1")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::with_client(http_client))
    }

    /// Creates a transport around an existing client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Bounds each individual attempt.
    ///
    /// This is the only thing that interrupts a hung call; the session's
    /// timeout budget is only checked between attempts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &Url, request: TransportRequest) -> Result<RawResponse> {
        let url = request.url(endpoint);

        tracing::debug!(
            method = %request.method,
            url = %url,
            has_body = request.body.is_some(),
            "Executing HTTP request"
        );

        let mut builder = self.http_client.request(request.method.clone(), url);

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = &request.authorization {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        tracing::debug!(status = status.as_u16(), "Received HTTP response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
