//! Error types for shipping API calls.
//!
//! Business failures reported by the provider are returned as data inside an
//! [`ApiResponse`](crate::ApiResponse) by default. The [`Error`] type covers
//! everything else, plus [`Error::Api`] for sessions that opt into error
//! signaling or callers that use [`ApiResponse::into_result`](crate::ApiResponse::into_result).

use crate::response::ErrorDetail;
use http::StatusCode;
use std::fmt;
use std::time::Duration;

/// The main error type for the shipping API client.
///
/// # Examples
///
/// ```no_run
/// use shipping_api::{Error, Session, ShippingRequest};
///
/// # async fn example(session: &Session) -> Result<(), Error> {
/// let mut request = ShippingRequest::new(());
/// let uri = "/shippingservices/v1/countries";
/// match shipping_api::get::<serde_json::Value, _>(uri, &mut request, Some(session)).await {
///     Ok(response) if response.success() => println!("{:?}", response.api_response),
///     Ok(response) => eprintln!("business failure: {:?}", response.errors),
///     Err(Error::Api(failure)) => eprintln!("raised failure: {}", failure),
///     Err(e) => eprintln!("client error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The API call completed unsuccessfully and the session is configured to
    /// raise failures instead of returning them.
    ///
    /// Carries the final status, every error detail and the elapsed time.
    #[error("Shipping API call failed: {0}")]
    Api(ApiFailure),

    /// A network-level error occurred outside the request/retry loop
    /// (document downloads, HTTP client construction).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The transport failed without a network error to wrap.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Missing or invalid configuration: no default session, missing
    /// credentials, invalid header values, empty endpoint paths.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Local I/O failed while writing a document or starting a runtime.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be decoded or has no content.
    #[error("Document error: {0}")]
    Document(String),
}

impl Error {
    /// Returns the failed response if this is an [`Error::Api`].
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            Error::Api(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(failure) => Some(failure.http_status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }
}

/// The unsuccessful outcome of an API call, as carried by [`Error::Api`].
///
/// This is the failed [`ApiResponse`](crate::ApiResponse) without its (absent)
/// body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// The final HTTP status.
    pub http_status: StatusCode,
    /// Every error detail, in the order they were reported.
    pub errors: Vec<ErrorDetail>,
    /// Wall-clock time spent on the call, across all attempts.
    pub request_time: Duration,
}

impl ApiFailure {
    /// Returns `true` if any error detail carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.http_status.as_u16())?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, error)?;
        }
        Ok(())
    }
}

/// A specialized `Result` type for shipping API calls.
pub type Result<T> = std::result::Result<T, Error>;
