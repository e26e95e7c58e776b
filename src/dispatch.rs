//! The authenticated request/retry loop every API call goes through.
//!
//! [`execute`] attaches a valid bearer token, calls the session's transport,
//! decodes the result, and repeats while the failure is transient and the
//! session's attempt count and timeout budget allow. Counters are updated
//! once per call, whatever the outcome. The verb functions ([`post`],
//! [`get`], [`put`], [`delete`], [`delete_with_body`]) are fixed-arity
//! wrappers that also resolve the default session.

use crate::{
    metadata::{carries_body, TransportRequest},
    request::{resolve_uri, ApiRequest},
    response::{decode, ApiResponse, ErrorDetail, DESERIALIZATION_ERROR, TRANSPORT_ERROR},
    session::{Session, SessionRef},
    token::AuthToken,
    Error, Result,
};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Makes one API call through `session`.
///
/// Unsuccessful calls are returned as data unless the session was built with
/// `throw_errors(true)`, in which case they become [`Error::Api`].
///
/// # Arguments
///
/// * `uri` - Endpoint path, possibly with `{name}` segments filled from the
///   request's URI parameters. Counters are keyed by this template.
/// * `verb` - The HTTP method
/// * `request` - The payload; its authorization slot is overwritten
/// * `allow_delete_body` - Whether a DELETE carries the payload as its body
///
/// # Errors
///
/// Returns an error for an empty `uri`, invalid request headers, a payload
/// that cannot be serialized, or an unsuccessful call on a throwing session.
/// The first three are still counted as failed calls for `uri`.
pub async fn execute<Res, Req>(
    session: &Session,
    uri: &str,
    verb: Method,
    request: &mut Req,
    allow_delete_body: bool,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let start_time = Instant::now();
    let template = match prepare(session, uri, verb, request, allow_delete_body) {
        Ok(template) => template,
        Err(e) => {
            session.counters().record(uri, false, start_time.elapsed());
            return Err(e);
        }
    };

    let mut attempts = 0;
    let outcome =
        attempt_loop::<Res, Req>(session, &template, request, start_time, &mut attempts).await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, path = %template.path, "Failed to deserialize response");
            ApiResponse::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![ErrorDetail::new(DESERIALIZATION_ERROR, e.to_string())],
            )
        }
    };

    response.request_time = start_time.elapsed();
    session
        .counters()
        .record(uri, response.success(), response.request_time);

    tracing::info!(
        method = %template.method,
        uri = %uri,
        status = response.http_status.as_u16(),
        success = response.success(),
        latency_ms = response.request_time.as_millis(),
        attempts = attempts,
        "Shipping API call finished"
    );

    if !response.success() {
        session.log_error(&format!(
            "{} {} failed: {}",
            template.method,
            uri,
            response.failure()
        ));
        if session.throw_errors() {
            return Err(Error::Api(response.failure()));
        }
    }

    Ok(response)
}

/// Builds the token-less part of the transport request.
fn prepare<Req: ApiRequest>(
    session: &Session,
    uri: &str,
    verb: Method,
    request: &Req,
    allow_delete_body: bool,
) -> Result<TransportRequest> {
    if uri.is_empty() {
        let message = "Endpoint path must not be empty".to_string();
        session.log_config_error(&message);
        return Err(Error::Configuration(message));
    }

    let path = resolve_uri(uri, &request.uri_params());
    let mut template = TransportRequest::new(verb, path);
    for (name, value) in request.headers() {
        template = template.with_header(name, value)?;
    }
    for (key, value) in request.query_params() {
        template = template.with_query_param(key, value);
    }

    if carries_body(&template.method, allow_delete_body) {
        let body = serde_json::to_value(request)
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;
        if !body.is_null() {
            template.body = Some(body);
        }
    }

    Ok(template)
}

/// Runs attempts until one succeeds, fails terminally, or the attempt count
/// or timeout budget runs out. `Err` means a 2xx body could not be parsed.
async fn attempt_loop<Res, Req>(
    session: &Session,
    template: &TransportRequest,
    request: &mut Req,
    start_time: Instant,
    attempts: &mut usize,
) -> std::result::Result<ApiResponse<Res>, serde_json::Error>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let retries = session.retries();
    let mut last_response: Option<ApiResponse<Res>> = None;

    for attempt in 1..=retries {
        *attempts = attempt;
        session.log_debug(&format!(
            "Calling method {} {} (attempt {} of {})",
            template.method, template.path, attempt, retries
        ));

        let token = match current_token(session).await {
            Ok(token) => token,
            Err(token_response) => {
                // A token body that does not parse is terminal, like any other
                // deserialization failure.
                if attempt == retries || token_response.has_error_code(DESERIALIZATION_ERROR) {
                    return Ok(token_response.retype());
                }
                if start_time.elapsed() > session.timeout() {
                    let response = last_response.take().unwrap_or_else(|| {
                        ApiResponse::failed(StatusCode::REQUEST_TIMEOUT, Vec::new())
                    });
                    return Ok(with_client_timeout(response));
                }
                session.log_warning(&format!(
                    "Token request failed on attempt {} of {}: {}",
                    attempt,
                    retries,
                    token_response.failure()
                ));
                pause(session, attempt, None, start_time).await;
                continue;
            }
        };

        request.set_authorization(token);
        let mut call = template.clone();
        call.authorization = request.authorization().map(str::to_string);

        let (response, headers) = match session.transport().send(session.endpoint(), call).await {
            Ok(raw) => (decode::<Res>(&raw)?, raw.headers),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    path = %template.path,
                    "Transport failed"
                );
                (
                    ApiResponse::failed(
                        StatusCode::SERVICE_UNAVAILABLE,
                        vec![ErrorDetail::new(TRANSPORT_ERROR, e.to_string())],
                    ),
                    HeaderMap::new(),
                )
            }
        };

        if response.success() {
            return Ok(response);
        }

        if !session
            .retry_predicate()
            .should_retry(response.http_status, &response.errors, attempt)
        {
            return Ok(response);
        }

        if start_time.elapsed() > session.timeout() {
            return Ok(with_client_timeout(response));
        }

        if attempt < retries {
            session.log_warning(&format!(
                "Retrying {} after transient failure on attempt {}: {}",
                template.path,
                attempt,
                response.failure()
            ));
            pause(session, attempt, Some(&headers), start_time).await;
        }
        last_response = Some(response);
    }

    Ok(last_response.unwrap_or_else(|| {
        with_client_timeout(ApiResponse::failed(StatusCode::REQUEST_TIMEOUT, Vec::new()))
    }))
}

/// Returns a copy of a valid token, obtaining one first if necessary.
///
/// Refreshes are serialized: a caller that waited for another caller's
/// refresh uses its result instead of requesting again.
async fn current_token(session: &Session) -> std::result::Result<String, ApiResponse<AuthToken>> {
    if let Some(token) = session.valid_token().await {
        return Ok(token);
    }

    let _gate = session.refresh_gate().lock().await;
    if let Some(token) = session.valid_token().await {
        return Ok(token);
    }

    tracing::debug!(endpoint = %session.endpoint(), "Obtaining access token");
    let response = session.token_provider().obtain(session).await;

    if response.success() {
        if let Some(token) = response.api_response.as_ref().filter(|t| t.is_valid()) {
            let access_token = token.access_token.clone();
            session.set_token(Some(token.clone())).await;
            return Ok(access_token);
        }
    }

    session.invalidate_token().await;
    if response.success() {
        return Err(ApiResponse::failed(
            StatusCode::UNAUTHORIZED,
            vec![ErrorDetail::new("Invalid token", "Token provider returned an unusable token")],
        ));
    }
    Err(response)
}

fn with_client_timeout<T>(mut response: ApiResponse<T>) -> ApiResponse<T> {
    response.http_status = StatusCode::REQUEST_TIMEOUT;
    response.errors.push(ErrorDetail::client_timeout());
    response
}

/// Waits before the next attempt, never past the timeout budget.
///
/// A rate-limit hint from the failed response wins over the backoff.
async fn pause(
    session: &Session,
    attempt: usize,
    headers: Option<&HeaderMap>,
    start_time: Instant,
) {
    let hinted = headers.and_then(|h| session.rate_limit_config().delay(h));
    let delay = hinted.unwrap_or_else(|| session.backoff().delay_for_attempt(attempt));
    let remaining = session.timeout().saturating_sub(start_time.elapsed());
    let delay = delay.min(remaining);

    if delay > Duration::ZERO {
        tracing::info!(
            delay_ms = delay.as_millis(),
            attempt = attempt,
            rate_limited = hinted.is_some(),
            "Waiting before next attempt"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Calls a POST endpoint.
///
/// # Examples
///
/// ```no_run
/// use shipping_api::{Session, ShippingRequest};
/// use serde_json::json;
///
/// # async fn example(session: &Session) -> Result<(), shipping_api::Error> {
/// let mut request = ShippingRequest::new(json!({ "carrier": "USPS" }))
///     .with_transaction_id("2019-08-01-001");
/// let response = shipping_api::post::<serde_json::Value, _>(
///     "/shippingservices/v1/manifests", &mut request, Some(session)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn post<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let session = SessionRef::resolve(session)?;
    execute(&session, uri, Method::POST, request, false).await
}

/// Calls a GET endpoint. The payload is never sent as a body.
pub async fn get<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let session = SessionRef::resolve(session)?;
    execute(&session, uri, Method::GET, request, false).await
}

/// Calls a PUT endpoint.
pub async fn put<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let session = SessionRef::resolve(session)?;
    execute(&session, uri, Method::PUT, request, false).await
}

/// Calls a DELETE endpoint without a body.
pub async fn delete<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let session = SessionRef::resolve(session)?;
    execute(&session, uri, Method::DELETE, request, false).await
}

/// Calls a DELETE endpoint that expects the payload as its body, as some of
/// the provider's cancellation endpoints do.
pub async fn delete_with_body<Res, Req>(
    uri: &str,
    request: &mut Req,
    session: Option<&Session>,
) -> Result<ApiResponse<Res>>
where
    Res: DeserializeOwned,
    Req: ApiRequest,
{
    let session = SessionRef::resolve(session)?;
    execute(&session, uri, Method::DELETE, request, true).await
}
