//! Integration tests using wiremock to simulate the provider's HTTP API.

use serde::{Deserialize, Serialize};
use shipping_api::api::{self, CountryRules, COUNTRIES_URI};
use shipping_api::document::{ContentType, Document, DocumentWriter};
use shipping_api::token::MISSING_CREDENTIALS;
use shipping_api::{
    ApiResponse, ConfigSource, Error, LogHooks, Session, ShippingRequest, DESERIALIZATION_ERROR,
    TRANSIENT_ERROR_CODE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{basic_auth, bearer_token, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Shipment {
    shipment_id: Option<String>,
    parcel_type: String,
}

fn credentials() -> ConfigSource {
    ConfigSource::from_map([("ApiKey", "key-123"), ("ApiSecret", "secret-456")])
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(basic_auth("key-123", "secret-456"))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-1",
            "tokenType": "BearerToken",
            "issuedAt": 1565891270u64,
            "expiresIn": 35999u64
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn session_for(server: &MockServer) -> Session {
    Session::builder()
        .endpoint(server.uri())
        .unwrap()
        .config(credentials())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_token_obtained_once_and_sent_as_bearer() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path("/shippingservices/v1/shipments"))
        .and(bearer_token("tok-1"))
        .and(header("X-PB-TransactionId", "tx-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "shipmentId": "USPS2200077432",
            "parcelType": "PKG"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);

    for _ in 0..2 {
        let mut request = ShippingRequest::new(Shipment {
            shipment_id: None,
            parcel_type: "PKG".to_string(),
        })
        .with_transaction_id("tx-1");
        let response: ApiResponse<Shipment> =
            shipping_api::post("/shippingservices/v1/shipments", &mut request, Some(&session))
                .await
                .unwrap();

        assert!(response.success());
        assert_eq!(response.http_status.as_u16(), 201);
        assert_eq!(
            response.api_response.unwrap().shipment_id.as_deref(),
            Some("USPS2200077432")
        );
    }
}

#[tokio::test]
async fn test_transient_rate_limit_then_success() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First request is rate limited, second succeeds
    Mock::given(method("POST"))
        .and(path(api::RATES_URI))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 1 {
                ResponseTemplate::new(429).set_body_json(serde_json::json!({
                    "errors": [{
                        "errorCode": TRANSIENT_ERROR_CODE,
                        "message": "Rate limit exceeded"
                    }]
                }))
            } else {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "shipmentId": null,
                    "parcelType": "PKG"
                }))
            }
        })
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let shipment = Shipment {
        shipment_id: None,
        parcel_type: "PKG".to_string(),
    };

    let response = api::rates(shipment.clone(), "tx-2", Some(&session)).await.unwrap();

    assert!(response.success());
    assert_eq!(response.api_response, Some(shipment));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_provider_errors_are_parsed() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path(api::RATES_URI))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!([
            {
                "errorCode": "PB-SHIPMENT-ERR-2016",
                "message": "Invalid parcel type",
                "additionalInfo": "parcelType"
            }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let response = api::rates(serde_json::json!({}), "tx-3", Some(&session)).await.unwrap();

    assert!(!response.success());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, "PB-SHIPMENT-ERR-2016");
    assert_eq!(response.errors[0].additional_info.as_deref(), Some("parcelType"));
}

#[tokio::test]
async fn test_missing_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(api::RATES_URI))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config_errors = Arc::new(AtomicUsize::new(0));
    let config_errors_clone = config_errors.clone();
    let session = Session::builder()
        .endpoint(mock_server.uri())
        .unwrap()
        .retries(1)
        .log_hooks(LogHooks::default().on_config_error(move |_| {
            config_errors_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

    let response = api::rates(serde_json::json!({}), "tx-4", Some(&session)).await.unwrap();

    assert_eq!(response.http_status.as_u16(), 401);
    assert!(response.has_error_code(MISSING_CREDENTIALS));
    assert_eq!(config_errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unparseable_token_body_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(api::RATES_URI))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let session = Session::builder()
        .endpoint(mock_server.uri())
        .unwrap()
        .config(credentials())
        .retries(3)
        .build()
        .unwrap();

    let response = api::rates(serde_json::json!({}), "tx-5", Some(&session)).await.unwrap();

    assert_eq!(response.http_status.as_u16(), 500);
    let codes: Vec<_> = response.errors.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, vec![DESERIALIZATION_ERROR]);
    assert!(session.valid_token().await.is_none());
}

#[tokio::test]
async fn test_throwing_session_with_real_transport() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path("/shippingservices/v1/tracking/123"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errors": [{
                "errorCode": "PB-TRACKING-ERR-404",
                "errorDescription": "Unknown tracking number"
            }]
        })))
        .mount(&mock_server)
        .await;

    let session = Session::builder()
        .endpoint(mock_server.uri())
        .unwrap()
        .config(credentials())
        .throw_errors(true)
        .build()
        .unwrap();

    let mut request = ShippingRequest::new(()).with_uri_param("trackingNumber", "123");
    let result: Result<ApiResponse<serde_json::Value>, Error> = shipping_api::get(
        "/shippingservices/v1/tracking/{trackingNumber}",
        &mut request,
        Some(&session),
    )
    .await;

    match result {
        Err(Error::Api(failure)) => {
            assert_eq!(failure.http_status.as_u16(), 404);
            assert_eq!(failure.errors[0].message, "Unknown tracking number");
        }
        other => panic!("Expected Error::Api, got {:?}", other),
    }
}

#[tokio::test]
async fn test_country_rules_cached() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path(COUNTRIES_URI))
        .and(query_param("carrier", "USPS"))
        .and(query_param("originCountryCode", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "countryCode": "CA", "countryName": "Canada" },
            { "countryCode": "MX", "countryName": "Mexico" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let rules = CountryRules::new("USPS", "US");

    assert!(rules.validate(&session, "CA").await);
    assert!(!rules.validate(&session, "FR").await);
    assert_eq!(
        rules.rules(&session).await.get("MX").map(String::as_str),
        Some("Mexico")
    );
}

#[tokio::test]
async fn test_country_rules_refresh_when_stale() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path(COUNTRIES_URI))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "countryCode": "CA", "countryName": "Canada" }
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let rules = CountryRules::new("USPS", "US").with_ttl(Duration::ZERO);

    assert!(rules.validate(&session, "CA").await);
    assert!(rules.validate(&session, "CA").await);
}

#[tokio::test]
async fn test_url_document_download() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/labels/L1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 label".to_vec()))
        .mount(&mock_server)
        .await;

    let document = Document {
        kind: Some("SHIPPING_LABEL".to_string()),
        content_type: ContentType::Url,
        file_format: "PDF".to_string(),
        size: Some("DOC_4X6".to_string()),
        contents: Some(format!("{}/labels/L1.pdf", mock_server.uri())),
        pages: Vec::new(),
    };

    let writer = DocumentWriter::new();
    let mut out = Vec::new();
    let written = writer.write_to(&document, &mut out).await.unwrap();
    assert_eq!(out, b"%PDF-1.4 label");
    assert_eq!(written, 14);

    let dir = tempfile::tempdir().unwrap();
    let paths = writer
        .write_pages(&document, |_| dir.path().join("label.pdf"))
        .await
        .unwrap();
    assert_eq!(std::fs::read(&paths[0]).unwrap(), b"%PDF-1.4 label");
}

#[tokio::test]
async fn test_url_document_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/labels/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let document = Document {
        kind: None,
        content_type: ContentType::Url,
        file_format: "PDF".to_string(),
        size: None,
        contents: Some(format!("{}/labels/gone.pdf", mock_server.uri())),
        pages: Vec::new(),
    };

    let result = DocumentWriter::new().write_to(&document, &mut Vec::<u8>::new()).await;
    assert!(matches!(result, Err(Error::Document(_))));
}
