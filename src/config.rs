//! Configuration lookup and logging hooks for a [`Session`](crate::Session).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Config key holding the API key used to obtain tokens.
pub const API_KEY: &str = "ApiKey";

/// Config key holding the API secret used to obtain tokens.
pub const API_SECRET: &str = "ApiSecret";

/// Config key holding the shipper id.
pub const SHIPPER_ID: &str = "ShipperID";

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Looks up configuration values by key.
///
/// # Examples
///
/// ```
/// use shipping_api::ConfigSource;
///
/// let config = ConfigSource::from_map([("ApiKey", "key"), ("ApiSecret", "secret")]);
/// assert_eq!(config.get("ApiKey").as_deref(), Some("key"));
/// assert_eq!(config.get("ShipperID"), None);
/// ```
#[derive(Clone)]
pub struct ConfigSource {
    lookup: Arc<Lookup>,
}

impl ConfigSource {
    /// Wraps an arbitrary lookup function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(f),
        }
    }

    /// A fixed set of key/value pairs.
    pub fn from_map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_fn(move |key| map.get(key).cloned())
    }

    /// Environment variables named `prefix` + key, e.g. `PB_ApiKey`.
    pub fn from_env(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::from_fn(move |key| std::env::var(format!("{}{}", prefix, key)).ok())
    }

    /// A source with no values.
    pub fn empty() -> Self {
        Self::from_fn(|_| None)
    }

    /// Looks up `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSource").finish_non_exhaustive()
    }
}

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks the session reports through.
///
/// Every hook defaults to a `tracing` event at the matching level, so a
/// session without custom hooks still logs through the subscriber.
#[derive(Clone)]
pub struct LogHooks {
    pub(crate) debug: Hook,
    pub(crate) warning: Hook,
    pub(crate) error: Hook,
    pub(crate) config_error: Hook,
}

impl LogHooks {
    /// Replaces the debug hook (one call per attempt).
    pub fn on_debug(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug = Arc::new(f);
        self
    }

    /// Replaces the warning hook (retries).
    pub fn on_warning(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.warning = Arc::new(f);
        self
    }

    /// Replaces the error hook (terminal failures).
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Arc::new(f);
        self
    }

    /// Replaces the config-error hook (missing configuration).
    pub fn on_config_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.config_error = Arc::new(f);
        self
    }
}

impl Default for LogHooks {
    fn default() -> Self {
        Self {
            debug: Arc::new(|msg| tracing::debug!(message = %msg)),
            warning: Arc::new(|msg| tracing::warn!(message = %msg)),
            error: Arc::new(|msg| tracing::error!(message = %msg)),
            config_error: Arc::new(|msg| tracing::error!(kind = "config", message = %msg)),
        }
    }
}

impl fmt::Debug for LogHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHooks").finish_non_exhaustive()
    }
}
