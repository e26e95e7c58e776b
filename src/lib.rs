//! # shipping-api - A client for the Pitney Bowes shipping APIs
//!
//! Every call goes through one authenticated request/retry core: it attaches
//! a bearer token (obtaining or refreshing it as needed), calls the
//! transport, decodes the response into an [`ApiResponse`], retries
//! transient failures within an attempt count and a wall-clock budget, and
//! records per-endpoint counters.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shipping_api::{ConfigSource, Session, ShippingRequest};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shipping_api::Error> {
//!     // Reads PB_ApiKey, PB_ApiSecret, ... from the environment
//!     let session = Arc::new(
//!         Session::builder()
//!             .endpoint(shipping_api::session::SANDBOX_ENDPOINT)?
//!             .config(ConfigSource::from_env("PB_"))
//!             .build()?,
//!     );
//!
//!     let mut request = ShippingRequest::new(json!({
//!         "fromAddress": { "postalCode": "06484", "countryCode": "US" },
//!         "toAddress": { "postalCode": "28607", "countryCode": "US" },
//!         "parcel": { "weight": { "unitOfMeasurement": "OZ", "weight": 3 } },
//!         "rates": [{ "carrier": "USPS", "serviceId": "PM", "parcelType": "PKG" }]
//!     }))
//!     .with_transaction_id("2019-08-01-0001");
//!
//!     let response = shipping_api::post::<serde_json::Value, _>(
//!         "/shippingservices/v1/rates", &mut request, Some(&session)).await?;
//!
//!     if response.success() {
//!         println!("{:?} in {:?}", response.api_response, response.request_time);
//!     } else {
//!         for error in &response.errors {
//!             eprintln!("{}", error);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Failures as data
//!
//! Unsuccessful calls come back as an [`ApiResponse`] with `success() ==
//! false` and an ordered error list. The client adds its own entries for a
//! few conditions: [`CLIENT_TIMEOUT`] when the budget runs out,
//! [`DESERIALIZATION_ERROR`] when a 2xx body does not parse, and
//! [`TRANSPORT_ERROR`] when nothing came back at all. Build the session with
//! `throw_errors(true)` to get [`Error::Api`] instead.
//!
//! ## Retries
//!
//! By default a call is retried only when the provider reports
//! [`TRANSIENT_ERROR_CODE`], with no pause between attempts. Both are
//! configurable:
//!
//! ```no_run
//! use shipping_api::{Backoff, Session};
//! use shipping_api::retry::{OrPredicate, RetryOnStatus, RetryOnTransientCode};
//! use http::StatusCode;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), shipping_api::Error> {
//! let session = Session::builder()
//!     .retries(5)
//!     .timeout(Duration::from_secs(20))
//!     .backoff(Backoff::Exponential {
//!         initial_delay: Duration::from_millis(200),
//!         max_delay: Duration::from_secs(5),
//!         jitter: true,
//!     })
//!     .retry_predicate(Box::new(OrPredicate::new(vec![
//!         Box::new(RetryOnTransientCode::default()),
//!         Box::new(RetryOnStatus::new([
//!             StatusCode::BAD_GATEWAY,
//!             StatusCode::SERVICE_UNAVAILABLE,
//!         ])),
//!     ])))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! [`mock::MockTransport`] and [`mock::MockTokenProvider`] stand in for the
//! network so code built on this crate can be tested offline.

pub mod api;
pub mod blocking;
pub mod config;
pub mod counters;
mod dispatch;
pub mod document;
mod error;
pub mod metadata;
pub mod mock;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
pub mod session;
pub mod token;
pub mod transport;

pub use config::{ConfigSource, LogHooks};
pub use counters::{CounterEntry, Counters};
pub use dispatch::{delete, delete_with_body, execute, get, post, put};
pub use error::{ApiFailure, Error, Result};
pub use request::{ApiRequest, ShippingRequest, TRANSACTION_ID_HEADER};
pub use response::{
    ApiResponse, ErrorDetail, CLIENT_TIMEOUT, DESERIALIZATION_ERROR, TRANSPORT_ERROR,
};
pub use retry::{Backoff, RetryPredicate, TRANSIENT_ERROR_CODE};
pub use session::{
    clear_default_session, default_session, set_default_session, Session, SessionBuilder,
};
pub use token::{AuthToken, OAuthTokenProvider, TokenProvider};
pub use transport::{HttpTransport, RawResponse, Transport};
