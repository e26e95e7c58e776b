//! The request capability every API call is made with.

use serde::{Serialize, Serializer};

/// A typed payload that can be sent through the orchestrator.
///
/// Implementors supply an authorization slot that the orchestrator fills with
/// a copy of the session's bearer token before every attempt, plus whatever
/// headers, query parameters and URI parameters the endpoint expects. The
/// serialized form is the JSON body; the authorization slot must not be part
/// of it.
///
/// Most callers can use [`ShippingRequest`] instead of implementing this.
pub trait ApiRequest: Serialize + Send + Sync {
    /// The token currently attached to this request.
    fn authorization(&self) -> Option<&str>;

    /// Attaches a token. Called by the orchestrator before every attempt.
    fn set_authorization(&mut self, token: String);

    /// Extra headers, e.g. `X-PB-TransactionId`.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Query parameters appended to the endpoint URL.
    fn query_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Values substituted for `{name}` segments in the endpoint path.
    fn uri_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Header carrying the caller's idempotency key for shipment operations.
pub const TRANSACTION_ID_HEADER: &str = "X-PB-TransactionId";

/// A general-purpose [`ApiRequest`] wrapping any serializable payload.
///
/// The payload is the whole JSON body. Use `()` for requests that only carry
/// query or URI parameters.
///
/// # Examples
///
/// ```
/// use shipping_api::{ApiRequest, ShippingRequest};
///
/// let request = ShippingRequest::new(())
///     .with_uri_param("trackingNumber", "9405509898642004103722")
///     .with_query_param("carrier", "USPS");
///
/// assert_eq!(request.query_params(), vec![("carrier".to_string(), "USPS".to_string())]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRequest<T> {
    /// The JSON body.
    pub payload: T,
    authorization: Option<String>,
    transaction_id: Option<String>,
    headers: Vec<(String, String)>,
    query_params: Vec<(String, String)>,
    uri_params: Vec<(String, String)>,
}

impl<T> ShippingRequest<T> {
    /// Wraps a payload.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            authorization: None,
            transaction_id: None,
            headers: Vec::new(),
            query_params: Vec::new(),
            uri_params: Vec::new(),
        }
    }

    /// Sets the `X-PB-TransactionId` header.
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Adds an arbitrary header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds a value for a `{name}` segment of the endpoint path.
    pub fn with_uri_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.uri_params.push((name.into(), value.into()));
        self
    }

    /// The transaction id, if set.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
}

impl<T: Serialize> Serialize for ShippingRequest<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

impl<T: Serialize + Send + Sync> ApiRequest for ShippingRequest<T> {
    fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    fn set_authorization(&mut self, token: String) {
        self.authorization = Some(token);
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(id) = &self.transaction_id {
            headers.push((TRANSACTION_ID_HEADER.to_string(), id.clone()));
        }
        headers
    }

    fn query_params(&self) -> Vec<(String, String)> {
        self.query_params.clone()
    }

    fn uri_params(&self) -> Vec<(String, String)> {
        self.uri_params.clone()
    }
}

/// Substitutes `{name}` segments of `uri` with the request's URI parameters.
pub(crate) fn resolve_uri(uri: &str, params: &[(String, String)]) -> String {
    params.iter().fold(uri.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authorization_is_not_serialized() {
        let mut request = ShippingRequest::new(json!({ "parcelType": "PKG" }));
        request.set_authorization("secret-token".to_string());

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({ "parcelType": "PKG" }));
        assert_eq!(request.authorization(), Some("secret-token"));
    }

    #[test]
    fn test_transaction_id_becomes_header() {
        let request = ShippingRequest::new(()).with_transaction_id("tx-1");
        assert_eq!(
            request.headers(),
            vec![(TRANSACTION_ID_HEADER.to_string(), "tx-1".to_string())]
        );
    }

    #[test]
    fn test_resolve_uri() {
        let params = vec![("shipmentId".to_string(), "USPS2200".to_string())];
        assert_eq!(
            resolve_uri("/shippingservices/v1/shipments/{shipmentId}", &params),
            "/shippingservices/v1/shipments/USPS2200"
        );
        assert_eq!(resolve_uri("/plain", &params), "/plain");
    }
}
