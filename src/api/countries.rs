//! Supported destination countries and a cache for validating against them.

use crate::{dispatch, ApiResponse, Result, Session, ShippingRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Country list endpoint.
pub const COUNTRIES_URI: &str = "/shippingservices/v1/countries";

/// How long a loaded country list is trusted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// A destination country supported by a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// ISO country code.
    #[serde(rename = "countryCode")]
    pub code: String,

    /// Display name.
    #[serde(rename = "countryName")]
    pub name: String,
}

/// Lists the countries `carrier` ships to from `origin_country_code`.
pub async fn countries(
    carrier: &str,
    origin_country_code: &str,
    session: Option<&Session>,
) -> Result<ApiResponse<Vec<Country>>> {
    let mut request = ShippingRequest::new(())
        .with_query_param("carrier", carrier)
        .with_query_param("originCountryCode", origin_country_code);
    dispatch::get(COUNTRIES_URI, &mut request, session).await
}

struct Loaded {
    at: Instant,
    countries: HashMap<String, String>,
}

/// Caches the country list and validates country codes against it.
///
/// The list is fetched on first use and again once it is older than the
/// TTL. A failed refresh keeps the previous list and is reported through the
/// session's error hook.
///
/// # Examples
///
/// ```no_run
/// use shipping_api::api::CountryRules;
///
/// # async fn example(session: &shipping_api::Session) {
/// let rules = CountryRules::new("USPS", "US");
/// if !rules.validate(session, "CA").await {
///     eprintln!("USPS does not ship to Canada from the US");
/// }
/// # }
/// ```
pub struct CountryRules {
    carrier: String,
    origin_country_code: String,
    ttl: Duration,
    state: Mutex<Option<Loaded>>,
}

impl CountryRules {
    /// Creates an empty cache for one carrier and origin.
    pub fn new(carrier: impl Into<String>, origin_country_code: impl Into<String>) -> Self {
        Self {
            carrier: carrier.into(),
            origin_country_code: origin_country_code.into(),
            ttl: DEFAULT_TTL,
            state: Mutex::new(None),
        }
    }

    /// Overrides the one-hour TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Country code to name, loading or refreshing first if needed.
    pub async fn rules(&self, session: &Session) -> HashMap<String, String> {
        let mut state = self.state.lock().await;
        self.refresh(session, &mut state).await;
        state
            .as_ref()
            .map(|loaded| loaded.countries.clone())
            .unwrap_or_default()
    }

    /// Returns `true` if `country_code` is in the list.
    pub async fn validate(&self, session: &Session, country_code: &str) -> bool {
        let mut state = self.state.lock().await;
        self.refresh(session, &mut state).await;
        state
            .as_ref()
            .is_some_and(|loaded| loaded.countries.contains_key(country_code))
    }

    async fn refresh(&self, session: &Session, state: &mut Option<Loaded>) {
        let fresh = state
            .as_ref()
            .is_some_and(|loaded| loaded.at.elapsed() < self.ttl);
        if fresh {
            return;
        }

        let result = countries(&self.carrier, &self.origin_country_code, Some(session)).await;
        match result.and_then(ApiResponse::into_result) {
            Ok(list) => {
                tracing::debug!(
                    count = list.len(),
                    carrier = %self.carrier,
                    "Loaded country rules"
                );
                *state = Some(Loaded {
                    at: Instant::now(),
                    countries: list.into_iter().map(|c| (c.code, c.name)).collect(),
                });
            }
            Err(e) => {
                session.log_error(&format!("Failed to load country rules: {}", e));
            }
        }
    }
}
