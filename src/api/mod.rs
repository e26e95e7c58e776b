//! Endpoint wrappers layered on the request core.
//!
//! These are thin: they pick the URI and verb, wrap the caller's payload in a
//! [`ShippingRequest`], and hand it to the core. The payload types are the
//! caller's own; this crate does not model the shipping domain.

pub mod countries;

use crate::{dispatch, ApiResponse, Result, Session, ShippingRequest};
use serde::{de::DeserializeOwned, Serialize};

pub use countries::{countries, Country, CountryRules, COUNTRIES_URI};

/// Rate-shopping endpoint.
pub const RATES_URI: &str = "/shippingservices/v1/rates";

/// Rates a shipment for one or more services before a label is bought.
///
/// The provider answers with the same shipment, its `rates` filled in, so the
/// response has the request's type.
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
///
/// # async fn example(session: &shipping_api::Session) -> Result<(), shipping_api::Error> {
/// let shipment = json!({
///     "fromAddress": { "postalCode": "06484", "countryCode": "US" },
///     "toAddress": { "postalCode": "28607", "countryCode": "US" },
///     "parcel": { "weight": { "unitOfMeasurement": "OZ", "weight": 3 } },
///     "rates": [{ "carrier": "USPS", "parcelType": "PKG" }]
/// });
/// let rated = shipping_api::api::rates(shipment, "tx-0001", Some(session)).await?;
/// println!("{:?}", rated.api_response);
/// # Ok(())
/// # }
/// ```
pub async fn rates<T>(
    shipment: T,
    transaction_id: &str,
    session: Option<&Session>,
) -> Result<ApiResponse<T>>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    let mut request = ShippingRequest::new(shipment).with_transaction_id(transaction_id);
    dispatch::post(RATES_URI, &mut request, session).await
}
