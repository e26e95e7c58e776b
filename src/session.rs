//! The per-client context every API call runs against.
//!
//! A [`Session`] holds the endpoint, the transport and token provider, the
//! cached token, retry and timeout settings, the logging hooks, the
//! configuration lookup and the per-endpoint counters. It is `Send + Sync`
//! and meant to be shared (usually behind an `Arc`) by every call a process
//! makes against one account.

use crate::{
    config::{ConfigSource, LogHooks},
    counters::Counters,
    rate_limit::RateLimitConfig,
    retry::{Backoff, RetryOnTransientCode, RetryPredicate},
    token::{AuthToken, OAuthTokenProvider, TokenProvider},
    transport::{HttpTransport, Transport},
    Error, Result,
};
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use url::Url;

/// The provider's sandbox endpoint.
pub const SANDBOX_ENDPOINT: &str = "https://api-sandbox.pitneybowes.com";

/// The provider's production endpoint.
pub const PRODUCTION_ENDPOINT: &str = "https://api.pitneybowes.com";

/// Default number of attempts per call.
pub const DEFAULT_RETRIES: usize = 3;

/// Default wall-clock budget per call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Shared context for API calls.
///
/// # Examples
///
/// ```no_run
/// use shipping_api::{ConfigSource, Session};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), shipping_api::Error> {
/// let session = Session::builder()
///     .endpoint(shipping_api::session::SANDBOX_ENDPOINT)?
///     .config(ConfigSource::from_env("PB_"))
///     .retries(3)
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    endpoint: Url,
    transport: Arc<dyn Transport>,
    token_provider: Arc<dyn TokenProvider>,
    token: RwLock<Option<AuthToken>>,
    refresh_gate: Mutex<()>,
    counters: Counters,
    retries: usize,
    timeout: Duration,
    throw_errors: bool,
    retry_predicate: Box<dyn RetryPredicate>,
    backoff: Backoff,
    rate_limit_config: RateLimitConfig,
    config: ConfigSource,
    hooks: LogHooks,
}

impl Session {
    /// Creates a new `SessionBuilder`.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// The service's base URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Attempts per call. Never less than one.
    pub fn retries(&self) -> usize {
        self.retries.max(1)
    }

    /// Wall-clock budget per call, measured from the first attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether unsuccessful calls are returned as [`Error::Api`].
    pub fn throw_errors(&self) -> bool {
        self.throw_errors
    }

    /// Per-endpoint counters for this session.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Looks up a configuration value.
    pub fn config_item(&self, key: &str) -> Option<String> {
        self.config.get(key)
    }

    /// Looks up a configuration value that must be present.
    ///
    /// # Errors
    ///
    /// Reports through the config-error hook and returns
    /// [`Error::Configuration`] if the key is missing.
    pub fn require_config_item(&self, key: &str) -> Result<String> {
        self.config.get(key).ok_or_else(|| {
            let message = format!("Missing configuration item {}", key);
            self.log_config_error(&message);
            Error::Configuration(message)
        })
    }

    /// Returns a copy of the cached token string, if the token is valid.
    pub async fn valid_token(&self) -> Option<String> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.access_token.clone())
    }

    /// Replaces the cached token.
    pub async fn set_token(&self, token: Option<AuthToken>) {
        *self.token.write().await = token;
    }

    /// Drops the cached token so the next call re-authenticates.
    pub async fn invalidate_token(&self) {
        self.set_token(None).await;
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn token_provider(&self) -> &dyn TokenProvider {
        self.token_provider.as_ref()
    }

    pub(crate) fn refresh_gate(&self) -> &Mutex<()> {
        &self.refresh_gate
    }

    pub(crate) fn retry_predicate(&self) -> &dyn RetryPredicate {
        self.retry_predicate.as_ref()
    }

    pub(crate) fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub(crate) fn rate_limit_config(&self) -> &RateLimitConfig {
        &self.rate_limit_config
    }

    pub(crate) fn log_debug(&self, message: &str) {
        (self.hooks.debug)(message)
    }

    pub(crate) fn log_warning(&self, message: &str) {
        (self.hooks.warning)(message)
    }

    pub(crate) fn log_error(&self, message: &str) {
        (self.hooks.error)(message)
    }

    pub(crate) fn log_config_error(&self, message: &str) {
        (self.hooks.config_error)(message)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint.as_str())
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .field("throw_errors", &self.throw_errors)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Session`].
///
/// Without explicit choices the session talks to the sandbox endpoint over
/// [`HttpTransport`], obtains tokens with [`OAuthTokenProvider`], makes three
/// attempts within five seconds and returns failures as data.
pub struct SessionBuilder {
    endpoint: Option<Url>,
    transport: Option<Arc<dyn Transport>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    token: Option<AuthToken>,
    retries: usize,
    timeout: Duration,
    throw_errors: bool,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    backoff: Backoff,
    rate_limit_config: RateLimitConfig,
    config: ConfigSource,
    hooks: LogHooks,
}

impl SessionBuilder {
    /// Creates a new `SessionBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            transport: None,
            token_provider: None,
            token: None,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            throw_errors: false,
            retry_predicate: None,
            backoff: Backoff::None,
            rate_limit_config: RateLimitConfig::default(),
            config: ConfigSource::empty(),
            hooks: LogHooks::default(),
        }
    }

    /// Sets the service's base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn endpoint(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.endpoint = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the token provider.
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Seeds the session with an already-obtained token.
    pub fn auth_token(mut self, token: AuthToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the number of attempts per call. Zero is treated as one.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the wall-clock budget per call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns unsuccessful calls as [`Error::Api`] instead of data.
    pub fn throw_errors(mut self, throw_errors: bool) -> Self {
        self.throw_errors = throw_errors;
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default only the provider's transient code is retried.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Sets the wait between attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets how `Retry-After` hints are honoured.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Sets the configuration lookup.
    pub fn config(mut self, config: ConfigSource) -> Self {
        self.config = config;
        self
    }

    /// Sets the logging hooks.
    pub fn log_hooks(mut self, hooks: LogHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Builds the configured `Session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP transport cannot be created.
    pub fn build(self) -> Result<Session> {
        let endpoint = match self.endpoint {
            Some(url) => url,
            None => Url::parse(SANDBOX_ENDPOINT)?,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let token_provider = self
            .token_provider
            .unwrap_or_else(|| Arc::new(OAuthTokenProvider::new()));

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnTransientCode::default()));

        Ok(Session {
            endpoint,
            transport,
            token_provider,
            token: RwLock::new(self.token),
            refresh_gate: Mutex::new(()),
            counters: Counters::new(),
            retries: self.retries,
            timeout: self.timeout,
            throw_errors: self.throw_errors,
            retry_predicate,
            backoff: self.backoff,
            rate_limit_config: self.rate_limit_config,
            config: self.config,
            hooks: self.hooks,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_SESSION: StdRwLock<Option<Arc<Session>>> = StdRwLock::new(None);

/// Installs the session used when a call is made without one.
///
/// Meant for the process entry point; library code should pass sessions
/// explicitly.
pub fn set_default_session(session: Arc<Session>) {
    *DEFAULT_SESSION
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(session);
}

/// Removes the default session.
pub fn clear_default_session() {
    *DEFAULT_SESSION
        .write()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

/// Returns the default session.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if none was installed.
pub fn default_session() -> Result<Arc<Session>> {
    DEFAULT_SESSION
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| {
            tracing::error!(kind = "config", "No session passed and no default session set");
            Error::Configuration("No default session has been set".to_string())
        })
}

/// A session borrowed from the caller or taken from the default slot.
pub(crate) enum SessionRef<'a> {
    Borrowed(&'a Session),
    Default(Arc<Session>),
}

impl<'a> SessionRef<'a> {
    pub(crate) fn resolve(session: Option<&'a Session>) -> Result<Self> {
        match session {
            Some(session) => Ok(SessionRef::Borrowed(session)),
            None => default_session().map(SessionRef::Default),
        }
    }
}

impl Deref for SessionRef<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        match self {
            SessionRef::Borrowed(session) => session,
            SessionRef::Default(session) => session,
        }
    }
}
