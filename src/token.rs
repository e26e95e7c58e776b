//! Bearer tokens and the providers that obtain them.

use crate::config::{API_KEY, API_SECRET};
use crate::metadata::TransportRequest;
use crate::response::{decode, ApiResponse, ErrorDetail, DESERIALIZATION_ERROR, TRANSPORT_ERROR};
use crate::session::Session;
use crate::transport::RawResponse;
use async_trait::async_trait;
use http::{header, Method, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Error code reported when the API key or secret is not configured.
pub const MISSING_CREDENTIALS: &str = "Missing credentials";

/// Path of the provider's token endpoint.
pub const TOKEN_PATH: &str = "/oauth/token";

/// Tokens are treated as expired this long before the provider says so.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// An access token obtained by a [`TokenProvider`].
///
/// Owned by the session that obtained it and replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// The bearer token string.
    pub access_token: String,

    /// The provider's token type, e.g. `BearerToken`.
    pub token_type: String,

    /// Lifetime reported by the provider, if any.
    pub expires_in: Option<Duration>,

    obtained_at: Instant,
}

impl AuthToken {
    /// Creates a token with no known expiry, obtained now.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "BearerToken".to_string(),
            expires_in: None,
            obtained_at: Instant::now(),
        }
    }

    /// Sets the lifetime, counted from when the token was obtained.
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Returns `false` for empty tokens and for tokens within a minute of
    /// their reported expiry.
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_in {
            Some(lifetime) => self.obtained_at.elapsed() + EXPIRY_SKEW < lifetime,
            None => true,
        }
    }
}

/// Obtains a fresh token.
///
/// Implementations do not retry; the orchestrator calls `obtain` again on
/// its next attempt. Failure is reported as an unsuccessful envelope so it
/// can be surfaced as the final response when attempts run out.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Requests a new token for `session`.
    async fn obtain(&self, session: &Session) -> ApiResponse<AuthToken>;
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(rename = "tokenType", default)]
    token_type: Option<String>,
    #[serde(rename = "expiresIn", default)]
    expires_in: Option<u64>,
}

impl From<TokenBody> for AuthToken {
    fn from(body: TokenBody) -> Self {
        let mut token = AuthToken::new(body.access_token);
        if let Some(token_type) = body.token_type {
            token.token_type = token_type;
        }
        token.expires_in = body.expires_in.map(Duration::from_secs);
        token
    }
}

/// Client-credentials token provider.
///
/// Posts `grant_type=client_credentials` to `{endpoint}/oauth/token` with HTTP
/// Basic authentication built from the session's `ApiKey` and `ApiSecret`
/// configuration values.
#[derive(Debug, Clone)]
pub struct OAuthTokenProvider {
    http_client: reqwest::Client,
    path: String,
}

impl OAuthTokenProvider {
    /// Creates a provider using the standard token path.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a provider around an existing client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            path: TOKEN_PATH.to_string(),
        }
    }

    /// Overrides the token endpoint path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    async fn exchange(
        &self,
        session: &Session,
        key: &str,
        secret: &str,
    ) -> Result<RawResponse, reqwest::Error> {
        let url = TransportRequest::new(Method::POST, self.path.clone()).url(session.endpoint());

        tracing::debug!(url = %url, "Requesting access token");

        let response = self
            .http_client
            .post(url)
            .basic_auth(key, Some(secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body("grant_type=client_credentials")
            .send()
            .await?;

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

impl Default for OAuthTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn obtain(&self, session: &Session) -> ApiResponse<AuthToken> {
        let (key, secret) = match (session.config_item(API_KEY), session.config_item(API_SECRET)) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                let message = format!("{} and {} must be configured", API_KEY, API_SECRET);
                session.log_config_error(&message);
                return ApiResponse::failed(
                    StatusCode::UNAUTHORIZED,
                    vec![ErrorDetail::new(MISSING_CREDENTIALS, message)],
                );
            }
        };

        let raw = match self.exchange(session, &key, &secret).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Token request failed");
                return ApiResponse::failed(
                    StatusCode::SERVICE_UNAVAILABLE,
                    vec![ErrorDetail::new(TRANSPORT_ERROR, e.to_string())],
                );
            }
        };

        match decode::<TokenBody>(&raw) {
            Ok(response) => response.map(AuthToken::from),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_response = %raw.body,
                    "Failed to deserialize token"
                );
                ApiResponse::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![ErrorDetail::new(DESERIALIZATION_ERROR, e.to_string())],
                )
            }
        }
    }
}
