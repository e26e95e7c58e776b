//! Per-attempt request metadata handed to a [`Transport`](crate::Transport).

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Everything a transport needs to perform one HTTP call.
///
/// Built by the orchestrator once per attempt, after the session's token has
/// been copied into the request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,

    /// The endpoint path with URI parameters already substituted,
    /// relative to the session endpoint.
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters, in order.
    pub query_params: Vec<(String, String)>,

    /// The bearer token to send, if any.
    pub authorization: Option<String>,

    /// The JSON body, or `None` when the verb must not carry one.
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    /// Creates a bare request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            authorization: None,
            body: None,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Resolves the full URL against the session endpoint.
    ///
    /// The endpoint's own path prefix is kept, so an endpoint of
    /// `https://host/api` and a path of `/v1/rates` yield `https://host/api/v1/rates`.
    pub fn url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        let prefix = endpoint.path().trim_end_matches('/');
        let path = if self.path.starts_with('/') {
            format!("{}{}", prefix, self.path)
        } else {
            format!("{}/{}", prefix, self.path)
        };
        url.set_path(&path);

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

/// Returns `true` if a request with this method should carry a body.
///
/// GET and HEAD never do; DELETE only when the endpoint asks for one.
pub(crate) fn carries_body(method: &Method, allow_delete_body: bool) -> bool {
    if *method == Method::GET || *method == Method::HEAD {
        false
    } else if *method == Method::DELETE {
        allow_delete_body
    } else {
        true
    }
}
