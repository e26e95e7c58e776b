//! Rates a parcel, buys a label and writes the label to disk.
//!
//! Reads `PB_ApiKey`, `PB_ApiSecret` and `PB_ShipperID` from the environment
//! and talks to the sandbox. Set `PB_MOCK=1` to run against canned replies
//! instead.
//!
//! Run with: `cargo run --example ship_label`

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use shipping_api::config::SHIPPER_ID;
use shipping_api::document::{Document, DocumentWriter};
use shipping_api::mock::{MockReply, MockTokenProvider, MockTransport};
use shipping_api::{ApiResponse, ConfigSource, Error, Session, ShippingRequest};
use std::path::PathBuf;
use std::sync::Arc;

const SHIPMENTS_URI: &str = "/shippingservices/v1/shipments";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentResponse {
    shipment_id: String,
    parcel_tracking_number: Option<String>,
    #[serde(default)]
    documents: Vec<Document>,
}

fn mock_session() -> Result<Session, Error> {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        shipping_api::api::RATES_URI,
        MockReply::json(
            200,
            json!({ "rates": [{ "carrier": "USPS", "totalCarrierCharge": 7.4 }] }),
        ),
    );
    transport.on(SHIPMENTS_URI, MockReply::transient());
    transport.on(
        SHIPMENTS_URI,
        MockReply::json(
            201,
            json!({
                "shipmentId": "USPS2200077432",
                "parcelTrackingNumber": "9405509898642004103722",
                "documents": [{
                    "type": "SHIPPING_LABEL",
                    "contentType": "BASE64",
                    "fileFormat": "PNG",
                    "pages": [{ "contents": STANDARD.encode("label page 1") }]
                }]
            }),
        ),
    );

    Session::builder()
        .transport(transport)
        .token_provider(Arc::new(MockTokenProvider::new()))
        .config(ConfigSource::from_map([(SHIPPER_ID, "9024324564")]))
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("shipping_api=debug,ship_label=info")
        .init();

    let session = if std::env::var("PB_MOCK").is_ok() {
        mock_session()?
    } else {
        Session::builder()
            .endpoint(shipping_api::session::SANDBOX_ENDPOINT)?
            .config(ConfigSource::from_env("PB_"))
            .build()?
    };
    let session = Arc::new(session);
    shipping_api::set_default_session(session.clone());

    let shipment = json!({
        "fromAddress": {
            "addressLines": ["27 Waterview Dr"], "postalCode": "06484", "countryCode": "US"
        },
        "toAddress": {
            "addressLines": ["284 Lakeview Dr"], "postalCode": "28607", "countryCode": "US"
        },
        "parcel": { "weight": { "unitOfMeasurement": "OZ", "weight": 3 } },
        "rates": [{ "carrier": "USPS", "serviceId": "PM", "parcelType": "PKG" }]
    });

    println!("=== Rating ===");
    let rated = shipping_api::api::rates(shipment.clone(), "demo-rate-0001", None).await?;
    if !rated.success() {
        for error in &rated.errors {
            eprintln!("Rate failed: {}", error);
        }
        return Ok(());
    }
    println!("Rates: {}", rated.api_response.unwrap_or_default()["rates"]);

    println!("=== Buying a label ===");
    let mut label = shipment;
    label["documents"] = json!([{
        "type": "SHIPPING_LABEL", "contentType": "BASE64", "size": "DOC_4X6", "fileFormat": "PNG"
    }]);
    let shipper_id = session.require_config_item(SHIPPER_ID)?;
    let mut request = ShippingRequest::new(label)
        .with_transaction_id("demo-label-0001")
        .with_query_param("includeDeliveryCommitment", "true")
        .with_header("X-PB-Shipper-Id", shipper_id);
    let response: ApiResponse<ShipmentResponse> =
        shipping_api::post(SHIPMENTS_URI, &mut request, None).await?;

    let Some(created) = response.api_response else {
        for error in &response.errors {
            eprintln!("Label failed: {}", error);
        }
        return Ok(());
    };
    println!("Shipment {} tracking {:?}", created.shipment_id, created.parcel_tracking_number);
    println!("Request took {:?}", response.request_time);

    let writer = DocumentWriter::new();
    for document in &created.documents {
        let extension = document.file_format.to_lowercase();
        let paths = writer
            .write_pages(document, |page| {
                PathBuf::from(format!("{}-p{}.{}", created.shipment_id, page + 1, extension))
            })
            .await?;
        for path in paths {
            println!("Wrote {}", path.display());
        }
    }

    for (uri, entry) in session.counters().snapshot_all() {
        println!("{}: {} calls, {} errors", uri, entry.call_count, entry.error_count);
    }

    Ok(())
}
