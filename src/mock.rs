//! Deterministic test doubles for the transport and the token provider.
//!
//! Both replay programmed outcomes in order; once a queue is down to its last
//! entry, that entry repeats forever. Every call is recorded so tests can
//! assert on how many attempts were made and what they carried.
//!
//! # Examples
//!
//! ```
//! use shipping_api::mock::{MockReply, MockTokenProvider, MockTransport};
//! use shipping_api::{Session, ShippingRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), shipping_api::Error> {
//! let transport = Arc::new(MockTransport::new());
//! transport.on("/shippingservices/v1/rates", MockReply::transient());
//! transport.on(
//!     "/shippingservices/v1/rates",
//!     MockReply::json(200, serde_json::json!({"rates": []})),
//! );
//!
//! let session = Session::builder()
//!     .transport(transport.clone())
//!     .token_provider(Arc::new(MockTokenProvider::new()))
//!     .build()?;
//!
//! let mut request = ShippingRequest::new(serde_json::json!({}));
//! let response = shipping_api::post::<serde_json::Value, _>(
//!     "/shippingservices/v1/rates", &mut request, Some(&session)).await?;
//! assert!(response.success());
//! assert_eq!(transport.call_count(), 2);
//! # Ok(())
//! # }
//! ```

use crate::{
    metadata::TransportRequest,
    response::{ApiResponse, ErrorDetail},
    retry::TRANSIENT_ERROR_CODE,
    session::Session,
    token::{AuthToken, TokenProvider},
    transport::{RawResponse, Transport},
    Error, Result,
};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Error code returned for paths with no programmed reply.
pub const MOCK_NOT_FOUND: &str = "Mock not found";

/// One programmed transport outcome.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Outcome,
    delay: Duration,
}

#[derive(Debug, Clone)]
enum Outcome {
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },
    Unreachable(String),
}

impl MockReply {
    /// A response with a raw text body.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Response {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                headers: HeaderMap::new(),
                body: body.into(),
            },
            delay: Duration::ZERO,
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::raw(status, body.to_string())
    }

    /// A failed response carrying provider error details.
    pub fn errors(status: u16, errors: Vec<ErrorDetail>) -> Self {
        let body = serde_json::json!({ "errors": errors });
        Self::json(status, body)
    }

    /// A failed response with a single error code.
    pub fn error(status: u16, code: &str, message: &str) -> Self {
        Self::errors(status, vec![ErrorDetail::new(code, message)])
    }

    /// The provider's transient rate-limit failure.
    pub fn transient() -> Self {
        Self::error(429, TRANSIENT_ERROR_CODE, "Rate limit exceeded")
    }

    /// A transport failure: no response arrives.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Unreachable(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Waits before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Adds a response header, e.g. `Retry-After`.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Outcome::Response { headers, .. } = &mut self.outcome {
            let name = HeaderName::try_from(name);
            let value = HeaderValue::from_str(value);
            if let (Ok(name), Ok(value)) = (name, value) {
                headers.insert(name, value);
            }
        }
        self
    }
}

/// A transport that answers from programmed replies keyed by endpoint path.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Creates a transport with no programmed replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for `path` (after URI parameter substitution).
    pub fn on(&self, path: impl Into<String>, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.into())
            .or_default()
            .push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn next_reply(&self, path: &str) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = replies.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, _endpoint: &Url, request: TransportRequest) -> Result<RawResponse> {
        let path = request.path.clone();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let Some(reply) = self.next_reply(&path) else {
            return Ok(RawResponse {
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: serde_json::json!({ "errors": [ErrorDetail::new(MOCK_NOT_FOUND, path)] })
                    .to_string(),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.outcome {
            Outcome::Response {
                status,
                headers,
                body,
            } => Ok(RawResponse {
                status,
                headers,
                body,
            }),
            Outcome::Unreachable(message) => Err(Error::Transport(message)),
        }
    }
}

/// A token provider that replays programmed outcomes.
///
/// With nothing programmed it always succeeds with the token `mock-token`.
#[derive(Debug, Default)]
pub struct MockTokenProvider {
    outcomes: Mutex<VecDeque<std::result::Result<String, ErrorDetail>>>,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl MockTokenProvider {
    /// Creates a provider that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful outcome.
    pub fn succeed(&self, token: impl Into<String>) -> &Self {
        self.push(Ok(token.into()))
    }

    /// Queues a failed outcome.
    pub fn fail(&self, code: impl Into<String>, message: impl Into<String>) -> &Self {
        self.push(Err(ErrorDetail::new(code, message)))
    }

    /// Number of times `obtain` was called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of failed `obtain` calls.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn push(&self, outcome: std::result::Result<String, ErrorDetail>) -> &Self {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
        self
    }

    fn next_outcome(&self) -> std::result::Result<String, ErrorDetail> {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if outcomes.len() > 1 {
            outcomes.pop_front()
        } else {
            outcomes.front().cloned()
        };
        next.unwrap_or_else(|| Ok("mock-token".to_string()))
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn obtain(&self, _session: &Session) -> ApiResponse<AuthToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            Ok(token) => ApiResponse::ok(StatusCode::OK, AuthToken::new(token)),
            Err(error) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                ApiResponse::failed(StatusCode::UNAUTHORIZED, vec![error])
            }
        }
    }
}
