//! The response envelope returned by every API call.
//!
//! An [`ApiResponse`] unifies success and failure: the parsed body is present
//! only on success, and failures carry an ordered list of [`ErrorDetail`]s that
//! come either from the provider or from the client itself (timeouts,
//! malformed bodies, transport failures).

use crate::error::{ApiFailure, Error, Result};
use crate::transport::RawResponse;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error code appended when the timeout budget is exhausted between attempts.
pub const CLIENT_TIMEOUT: &str = "Client Timeout";

/// Error code used when a successful response body cannot be parsed.
pub const DESERIALIZATION_ERROR: &str = "Deserialization error";

/// Error code used when the transport failed before any response arrived.
pub const TRANSPORT_ERROR: &str = "Transport error";

/// A single error reported for an API call.
///
/// The wire names follow the provider's contract (`errorCode`, `message`,
/// `additionalInfo`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code, e.g. `PB-APIM-ERR-1003`.
    #[serde(rename = "errorCode", alias = "code")]
    pub code: String,

    /// Human-readable message.
    #[serde(default, alias = "errorDescription")]
    pub message: String,

    /// Extra context supplied by the provider, if any.
    #[serde(
        rename = "additionalInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_info: Option<String>,
}

impl ErrorDetail {
    /// Creates an error detail with no additional info.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            additional_info: None,
        }
    }

    /// The synthetic error appended when the timeout budget runs out.
    pub fn client_timeout() -> Self {
        Self::new(CLIENT_TIMEOUT, CLIENT_TIMEOUT)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The result of an API call, successful or not.
///
/// `success()` is derived from the other fields: a response is successful if
/// and only if it has no errors and a 2xx status.
///
/// # Examples
///
/// ```
/// use shipping_api::{ApiResponse, ErrorDetail};
/// use http::StatusCode;
///
/// let ok = ApiResponse::ok(StatusCode::OK, 42);
/// assert!(ok.success());
///
/// let failed: ApiResponse<u32> = ApiResponse::failed(
///     StatusCode::BAD_REQUEST,
///     vec![ErrorDetail::new("PB-SHIPMENT-ERR-1", "Invalid address")],
/// );
/// assert!(!failed.success());
/// assert!(failed.into_result().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    /// The parsed response body, present only on success.
    pub api_response: Option<T>,

    /// The HTTP status of the final attempt, or a synthetic status
    /// (408 for client timeouts, 500 for deserialization failures, 503 for
    /// transport failures).
    pub http_status: StatusCode,

    /// Errors in the order they were reported. Synthetic errors are appended
    /// after any provider errors.
    pub errors: Vec<ErrorDetail>,

    /// Wall-clock time spent on the call, across all attempts.
    pub request_time: Duration,
}

impl<T> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(http_status: StatusCode, body: T) -> Self {
        Self {
            api_response: Some(body),
            http_status,
            errors: Vec::new(),
            request_time: Duration::ZERO,
        }
    }

    /// Creates a failed response.
    pub fn failed(http_status: StatusCode, errors: Vec<ErrorDetail>) -> Self {
        Self {
            api_response: None,
            http_status,
            errors,
            request_time: Duration::ZERO,
        }
    }

    /// Returns `true` if there are no errors and the status is 2xx.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && self.http_status.is_success()
    }

    /// Returns `true` if any error detail carries `code`.
    pub fn has_error_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Returns the failure view of this response.
    pub fn failure(&self) -> ApiFailure {
        ApiFailure {
            http_status: self.http_status,
            errors: self.errors.clone(),
            request_time: self.request_time,
        }
    }

    /// Converts the envelope into a `Result`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the response was not successful.
    pub fn into_result(self) -> Result<T> {
        if !self.success() {
            return Err(Error::Api(self.failure()));
        }
        match self.api_response {
            Some(body) => Ok(body),
            None => Err(Error::Api(self.failure())),
        }
    }

    /// Maps the response body to a different type, preserving everything else.
    pub fn map<U, F>(self, f: F) -> ApiResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        ApiResponse {
            api_response: self.api_response.map(f),
            http_status: self.http_status,
            errors: self.errors,
            request_time: self.request_time,
        }
    }

    /// Re-types a failed response. The body, if any, is dropped.
    pub(crate) fn retype<U>(self) -> ApiResponse<U> {
        ApiResponse {
            api_response: None,
            http_status: self.http_status,
            errors: self.errors,
            request_time: self.request_time,
        }
    }
}

/// Shapes the provider uses for error bodies.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    List(Vec<ErrorDetail>),
    Wrapped { errors: Vec<ErrorDetail> },
    Single(ErrorDetail),
}

/// Parses an error body, falling back to the numeric status and raw text.
pub(crate) fn parse_errors(status: StatusCode, body: &str) -> Vec<ErrorDetail> {
    let parsed = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::List(errors)) | Ok(ErrorBody::Wrapped { errors }) => errors,
        Ok(ErrorBody::Single(error)) => vec![error],
        Err(_) => Vec::new(),
    };

    if parsed.is_empty() {
        vec![ErrorDetail::new(status.as_u16().to_string(), body.trim())]
    } else {
        parsed
    }
}

/// Decodes a raw transport response into a typed envelope.
///
/// Returns the serde error if a 2xx body cannot be parsed as `T`. An empty
/// 2xx body is parsed as JSON `null`, so `()` and `Option<_>` bodies work.
pub(crate) fn decode<T>(raw: &RawResponse) -> std::result::Result<ApiResponse<T>, serde_json::Error>
where
    T: DeserializeOwned,
{
    if !raw.status.is_success() {
        return Ok(ApiResponse::failed(
            raw.status,
            parse_errors(raw.status, &raw.body),
        ));
    }

    let body = if raw.body.trim().is_empty() {
        "null"
    } else {
        raw.body.as_str()
    };
    let data = serde_json::from_str::<T>(body)?;
    Ok(ApiResponse::ok(raw.status, data))
}
