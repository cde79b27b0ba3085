//! Snapshot codec for the cart and checkout cookies.
//!
//! Dates travel as RFC 3339 strings and come back as `DateTime<Utc>`.
//! Checkout payment data is sanitized on the way out; the stored type
//! has no card field at all.

use crate::core::state::{
    CartItem, CartState, CheckoutState, CheckoutStep, GuestInfo, OrderData, PaymentMethod,
    ShippingInfo, StoredPaymentMethod,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version written into every cart snapshot.
pub const CART_SCHEMA_VERSION: &str = "1.0";

/// Persisted cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Lines in insertion order.
    #[serde(default)]
    pub items: Vec<CartItem>,

    /// Browsing session.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Last content change.
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,

    /// When the snapshot was written.
    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    CART_SCHEMA_VERSION.to_string()
}

/// Persisted checkout session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutSnapshot {
    /// Session identifier.
    pub session_id: Option<String>,
    /// Current step.
    pub current_step: CheckoutStep,
    /// Address and method.
    pub shipping_info: Option<ShippingInfo>,
    /// Sanitized payment method.
    pub payment_method: Option<StoredPaymentMethod>,
    /// Guest contact.
    pub guest_info: Option<GuestInfo>,
    /// Resolved contact email.
    pub contact_email: Option<String>,
    /// Placed order summary.
    pub order_data: Option<OrderData>,
    /// Expiry instant.
    pub session_expires_at: Option<DateTime<Utc>>,
    /// Last persisted write.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Terms accepted.
    pub terms_accepted: bool,
    /// Privacy accepted.
    pub privacy_accepted: bool,
    /// Marketing opt-in.
    pub marketing_consent: bool,
}

impl From<CheckoutSnapshot> for CheckoutState {
    fn from(snapshot: CheckoutSnapshot) -> Self {
        let contact_email = snapshot.contact_email.or_else(|| {
            snapshot
                .order_data
                .as_ref()
                .and_then(|order| order.customer_email.clone())
        });
        Self {
            session_id: snapshot.session_id,
            current_step: snapshot.current_step,
            shipping_info: snapshot.shipping_info,
            payment_method: snapshot.payment_method.map(PaymentMethod::from),
            guest_info: snapshot.guest_info,
            contact_email,
            order_data: snapshot.order_data,
            session_expires_at: snapshot.session_expires_at,
            last_sync_at: snapshot.last_sync_at,
            terms_accepted: snapshot.terms_accepted,
            privacy_accepted: snapshot.privacy_accepted,
            marketing_consent: snapshot.marketing_consent,
        }
    }
}

/// Snapshot the cart as of `now`.
#[must_use]
pub fn serialize_cart(state: &CartState, now: DateTime<Utc>) -> CartSnapshot {
    CartSnapshot {
        items: state.items.clone(),
        session_id: state.session_id.clone(),
        last_sync_at: state.last_sync_at,
        timestamp: now,
        version: CART_SCHEMA_VERSION.to_string(),
    }
}

/// Encode a cart snapshot as cookie text.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn encode_cart(snapshot: &CartSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decode cookie text into a cart snapshot.
///
/// Empty or `null` text means there is no cart. Missing `items` is an
/// empty cart; `items` that is not an array is a validation failure, as
/// is a line with zero quantity or an unsupported schema version.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON or fails validation.
pub fn decode_cart(raw: &str) -> Result<Option<CartSnapshot>> {
    let Some(mut map) = parse_object(raw, "cart")? else {
        return Ok(None);
    };

    match map.get("items").map(json_kind) {
        None | Some("null") => {
            map.insert("items".to_string(), Value::Array(Vec::new()));
        }
        Some("array") => {}
        Some(kind) => {
            return Err(Error::Validation(format!(
                "cart items must be an array, found {kind}"
            )));
        }
    }

    let snapshot: CartSnapshot = serde_json::from_value(Value::Object(map))?;

    if !snapshot.version.starts_with("1.") {
        return Err(Error::Validation(format!(
            "unsupported cart schema version {}",
            snapshot.version
        )));
    }
    if let Some(item) = snapshot.items.iter().find(|item| item.quantity == 0) {
        return Err(Error::Validation(format!(
            "cart line {} has zero quantity",
            item.id
        )));
    }

    Ok(Some(snapshot))
}

/// Strip card details from a payment method.
///
/// Everything else passes through unchanged.
#[must_use]
pub fn sanitize_payment_method(method: &PaymentMethod) -> StoredPaymentMethod {
    StoredPaymentMethod {
        kind: method.kind,
        cash: method.cash.clone(),
        paypal: method.paypal.clone(),
        bank_transfer: method.bank_transfer.clone(),
        save_for_future: method.save_for_future,
    }
}

/// Snapshot a checkout session, sanitizing the payment method.
#[must_use]
pub fn serialize_checkout(state: &CheckoutState) -> CheckoutSnapshot {
    CheckoutSnapshot {
        session_id: state.session_id.clone(),
        current_step: state.current_step,
        shipping_info: state.shipping_info.clone(),
        payment_method: state.payment_method.as_ref().map(sanitize_payment_method),
        guest_info: state.guest_info.clone(),
        contact_email: state.contact_email.clone(),
        order_data: state.order_data.clone(),
        session_expires_at: state.session_expires_at,
        last_sync_at: state.last_sync_at,
        terms_accepted: state.terms_accepted,
        privacy_accepted: state.privacy_accepted,
        marketing_consent: state.marketing_consent,
    }
}

/// Encode a checkout snapshot as cookie text.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub fn encode_checkout(snapshot: &CheckoutSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decode cookie text into a checkout snapshot.
///
/// Empty or `null` text means there is no session. Missing fields take
/// their defaults.
///
/// # Errors
///
/// Returns an error if the text is not a valid checkout snapshot.
pub fn decode_checkout(raw: &str) -> Result<Option<CheckoutSnapshot>> {
    let Some(map) = parse_object(raw, "checkout session")? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(Value::Object(map))?))
}

/// Parse cookie text into a JSON object; `None` for empty or `null`.
fn parse_object(raw: &str, what: &str) -> Result<Option<Map<String, Value>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(Error::Validation(format!(
            "{what} snapshot must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{CardDetails, CashDetails, PaymentType, Product};
    use chrono::Duration;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price,
            images: vec![format!("/img/{id}.jpg")],
            stock: 100,
            category: Some("wine".to_string()),
            slug: id.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn item(id: &str, quantity: u32) -> CartItem {
        CartItem {
            id: format!("item_{id}"),
            product: product(id, 25.99),
            quantity,
            added_at: Utc::now(),
            last_modified: None,
        }
    }

    fn card_payment() -> PaymentMethod {
        PaymentMethod::card(CardDetails {
            number: "4242424242424242".to_string(),
            expiry_month: "12".to_string(),
            expiry_year: "2030".to_string(),
            cvc: "123".to_string(),
            holder_name: "Ion Popescu".to_string(),
        })
    }

    #[test]
    fn cart_round_trip_revives_dates() {
        let state = CartState {
            items: vec![item("a", 1), item("b", 3)],
            session_id: Some("cart_1".to_string()),
            last_sync_at: Some(Utc::now()),
        };
        let now = Utc::now();

        let raw = encode_cart(&serialize_cart(&state, now)).unwrap();
        let decoded = decode_cart(&raw).unwrap().unwrap();

        assert_eq!(decoded.items, state.items);
        assert_eq!(decoded.session_id.as_deref(), Some("cart_1"));
        assert_eq!(decoded.timestamp, now);
        assert_eq!(decoded.version, "1.0");
    }

    #[test]
    fn cart_wire_shape_uses_iso_strings() {
        let state = CartState {
            items: vec![item("a", 1)],
            ..CartState::default()
        };
        let raw = encode_cart(&serialize_cart(&state, Utc::now())).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();

        assert!(value["items"][0]["addedAt"].is_string());
        assert!(value["timestamp"].is_string());
        assert!(value["sessionId"].is_null());
        assert_eq!(value["version"], "1.0");
    }

    #[test]
    fn empty_cookie_is_no_cart() {
        assert!(decode_cart("").unwrap().is_none());
        assert!(decode_cart("   ").unwrap().is_none());
        assert!(decode_cart("null").unwrap().is_none());
    }

    #[test]
    fn missing_items_is_empty_cart() {
        let decoded = decode_cart(r#"{"sessionId":"s1"}"#).unwrap().unwrap();
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn non_array_items_fail_validation() {
        let result = decode_cart(r#"{"items":"not-an-array","version":"1.0"}"#);
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = decode_cart(r#"{"items":{"0":{}}}"#);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn garbage_text_is_an_error_not_a_panic() {
        assert!(matches!(decode_cart("{ nope"), Err(Error::Serde(_))));
        assert!(matches!(decode_cart("[1,2]"), Err(Error::Validation(_))));
        assert!(decode_cart(r#"{"items":[{"id":1}]}"#).is_err());
    }

    #[test]
    fn zero_quantity_line_fails_validation() {
        let state = CartState {
            items: vec![item("a", 0)],
            ..CartState::default()
        };
        let raw = encode_cart(&serialize_cart(&state, Utc::now())).unwrap();
        assert!(matches!(decode_cart(&raw), Err(Error::Validation(_))));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let result = decode_cart(r#"{"items":[],"version":"2.0"}"#);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn sanitize_drops_card_keeps_rest() {
        let mut method = card_payment();
        method.save_for_future = Some(true);

        let stored = sanitize_payment_method(&method);
        assert_eq!(stored.kind, PaymentType::CreditCard);
        assert_eq!(stored.save_for_future, Some(true));

        let json = serde_json::to_value(&stored).unwrap();
        assert!(json.get("card").is_none());
        assert!(!json.to_string().contains("4242"));
    }

    #[test]
    fn sanitize_passes_cash_through() {
        let stored = sanitize_payment_method(&PaymentMethod::cash());
        assert_eq!(stored.kind, PaymentType::Cash);
        assert_eq!(stored.cash, Some(CashDetails { confirmed: true }));
    }

    #[test]
    fn checkout_snapshot_never_contains_card() {
        let state = CheckoutState {
            session_id: Some("checkout_1".to_string()),
            payment_method: Some(card_payment()),
            session_expires_at: Some(Utc::now() + Duration::minutes(30)),
            ..CheckoutState::default()
        };

        let raw = encode_checkout(&serialize_checkout(&state)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["paymentMethod"]["type"], "credit_card");
        assert!(value["paymentMethod"].get("card").is_none());
        assert!(value["paymentMethod"].get("creditCard").is_none());
        assert!(!raw.contains("4242424242424242"));
        assert!(value["sessionExpiresAt"].is_string());
    }

    #[test]
    fn stored_card_field_is_ignored_on_decode() {
        let raw = r#"{"paymentMethod":{"type":"credit_card","card":{"number":"4111"}}}"#;
        let snapshot = decode_checkout(raw).unwrap().unwrap();
        let state = CheckoutState::from(snapshot);

        assert!(state.payment_method.unwrap().card.is_none());
    }

    #[test]
    fn checkout_defaults_for_missing_fields() {
        let snapshot = decode_checkout(r#"{"sessionId":"abc"}"#).unwrap().unwrap();
        assert_eq!(snapshot.current_step, CheckoutStep::Shipping);
        assert!(!snapshot.terms_accepted);
        assert!(snapshot.session_expires_at.is_none());
        assert!(decode_checkout("").unwrap().is_none());
    }

    #[test]
    fn contact_email_falls_back_to_order_email() {
        let raw = r#"{
            "orderData": {
                "items": [], "subtotal": 10.0, "shippingCost": 0.0, "tax": 0.0,
                "total": 10.0, "currency": "EUR", "customerEmail": "buyer@example.md"
            }
        }"#;
        let state = CheckoutState::from(decode_checkout(raw).unwrap().unwrap());
        assert_eq!(state.contact_email.as_deref(), Some("buyer@example.md"));
    }

    fn arb_item() -> impl Strategy<Value = CartItem> {
        ("[a-z0-9]{1,12}", 1u32..500, 0u32..100_000, -100_000i64..100_000).prop_map(
            |(id, quantity, cents, offset)| CartItem {
                id: format!("item_{id}"),
                product: product(&id, f64::from(cents) / 100.0),
                quantity,
                added_at: Utc::now() + Duration::seconds(offset),
                last_modified: None,
            },
        )
    }

    proptest! {
        #[test]
        fn cart_round_trip_preserves_items(items in prop::collection::vec(arb_item(), 0..8)) {
            let state = CartState { items, ..CartState::default() };
            let raw = encode_cart(&serialize_cart(&state, Utc::now())).unwrap();
            let decoded = decode_cart(&raw).unwrap().unwrap();

            prop_assert_eq!(decoded.items.len(), state.items.len());
            for (got, want) in decoded.items.iter().zip(&state.items) {
                prop_assert_eq!(&got.id, &want.id);
                prop_assert_eq!(got.quantity, want.quantity);
                prop_assert_eq!(&got.product.id, &want.product.id);
                prop_assert_eq!(got.added_at, want.added_at);
                prop_assert!((got.product.price - want.product.price).abs() < 1e-9);
            }
        }

        #[test]
        fn persisted_checkout_never_leaks_card(
            number in "[0-9]{12,19}",
            cvc in "[0-9]{3,4}",
            save in proptest::option::of(any::<bool>()),
        ) {
            let mut method = PaymentMethod::card(CardDetails {
                number: number.clone(),
                expiry_month: "01".to_string(),
                expiry_year: "2031".to_string(),
                cvc,
                holder_name: String::new(),
            });
            method.save_for_future = save;
            let state = CheckoutState {
                payment_method: Some(method),
                ..CheckoutState::default()
            };

            let raw = encode_checkout(&serialize_checkout(&state)).unwrap();
            let value: Value = serde_json::from_str(&raw).unwrap();
            prop_assert!(value["paymentMethod"].get("card").is_none());
            prop_assert!(!raw.contains(&number));
        }
    }
}
