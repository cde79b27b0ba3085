//! Cart and checkout state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Catalog product as captured when it was added to the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Unit price.
    pub price: f64,

    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,

    /// Units available when captured.
    pub stock: u32,

    /// Category slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// URL slug.
    #[serde(default)]
    pub slug: String,

    /// Chosen options (size, vintage, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// One line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line identifier, distinct from the product id.
    pub id: String,

    /// Product snapshot.
    pub product: Product,

    /// Always at least 1.
    pub quantity: u32,

    /// When the line was created.
    pub added_at: DateTime<Utc>,

    /// When the quantity last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

/// In-memory cart contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    /// Lines in insertion order.
    pub items: Vec<CartItem>,

    /// Browsing session the cart belongs to.
    pub session_id: Option<String>,

    /// Last time the contents changed.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Cart lock held by a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLock {
    /// When the lock was taken.
    pub locked_at: DateTime<Utc>,

    /// When the lock lapses on its own.
    pub locked_until: DateTime<Utc>,

    /// Session holding the lock.
    pub checkout_session_id: String,
}

/// Checkout step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Address and shipping method.
    #[default]
    Shipping,

    /// Payment method.
    Payment,

    /// Final review.
    Review,

    /// Order placed.
    Confirmation,
}

impl CheckoutStep {
    /// Steps in flow order.
    pub const ALL: [Self; 4] = [
        Self::Shipping,
        Self::Payment,
        Self::Review,
        Self::Confirmation,
    ];

    /// Position in the flow, starting at 0.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Shipping => 0,
            Self::Payment => 1,
            Self::Review => 2,
            Self::Confirmation => 3,
        }
    }

    /// Following step, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Preceding step, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckoutStep {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| crate::Error::Validation(format!("unknown checkout step: {s}")))
    }
}

/// Delivery address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Street and number.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// ISO country code.
    pub country: String,
    /// Contact phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Shipping option offered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    /// Method identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Cost.
    pub price: f64,
    /// Delivery estimate in days.
    pub estimated_days: u32,
}

/// Address plus chosen shipping method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingInfo {
    /// Delivery address.
    pub address: Address,
    /// Chosen method.
    pub method: ShippingMethod,
}

/// Payment method kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Card payment.
    CreditCard,
    /// Cash on delivery.
    Cash,
    /// `PayPal`.
    Paypal,
    /// Bank transfer.
    BankTransfer,
}

/// Raw card details. Never persisted; wiped from memory on drop.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    /// Primary account number.
    pub number: String,
    /// Expiry month.
    #[serde(default)]
    pub expiry_month: String,
    /// Expiry year.
    #[serde(default)]
    pub expiry_year: String,
    /// Security code.
    #[serde(default, alias = "cvv")]
    pub cvc: String,
    /// Cardholder name.
    #[serde(default)]
    pub holder_name: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_four: String = self
            .number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{last_four}"))
            .field("cvc", &"***")
            .finish_non_exhaustive()
    }
}

/// Cash-on-delivery details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CashDetails {
    /// Customer confirmed paying cash.
    #[serde(default)]
    pub confirmed: bool,
}

/// `PayPal` details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaypalDetails {
    /// `PayPal` account email.
    #[serde(default)]
    pub email: String,
}

/// Bank transfer details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankTransferDetails {
    /// Transfer reference.
    #[serde(default)]
    pub reference: String,
}

/// Payment method as entered by the customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    /// Method kind.
    #[serde(rename = "type")]
    pub kind: PaymentType,

    /// Card details, only for card payments.
    #[serde(default, alias = "creditCard", skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDetails>,

    /// Cash details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash: Option<CashDetails>,

    /// `PayPal` details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal: Option<PaypalDetails>,

    /// Bank transfer details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_transfer: Option<BankTransferDetails>,

    /// Customer asked to keep this method on file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_for_future: Option<bool>,
}

impl PaymentMethod {
    /// Method of `kind` with no sub-object.
    #[must_use]
    pub fn new(kind: PaymentType) -> Self {
        Self {
            kind,
            card: None,
            cash: None,
            paypal: None,
            bank_transfer: None,
            save_for_future: None,
        }
    }

    /// Card payment.
    #[must_use]
    pub fn card(card: CardDetails) -> Self {
        Self {
            card: Some(card),
            ..Self::new(PaymentType::CreditCard)
        }
    }

    /// Confirmed cash payment.
    #[must_use]
    pub fn cash() -> Self {
        Self {
            cash: Some(CashDetails { confirmed: true }),
            ..Self::new(PaymentType::Cash)
        }
    }
}

/// Payment method in its persisted form.
///
/// Has no card field, so card data cannot reach storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPaymentMethod {
    /// Method kind.
    #[serde(rename = "type")]
    pub kind: PaymentType,

    /// Cash details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash: Option<CashDetails>,

    /// `PayPal` details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal: Option<PaypalDetails>,

    /// Bank transfer details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_transfer: Option<BankTransferDetails>,

    /// Customer asked to keep this method on file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_for_future: Option<bool>,
}

impl From<StoredPaymentMethod> for PaymentMethod {
    fn from(stored: StoredPaymentMethod) -> Self {
        Self {
            kind: stored.kind,
            card: None,
            cash: stored.cash,
            paypal: stored.paypal,
            bank_transfer: stored.bank_transfer,
            save_for_future: stored.save_for_future,
        }
    }
}

/// Guest checkout contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    /// Contact email.
    pub email: String,
    /// Opted into order emails.
    #[serde(default)]
    pub email_updates: bool,
}

/// One line of a placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Product identifier.
    pub product_id: String,
    /// Product as ordered.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub product_snapshot: Value,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
    /// Line total.
    pub total: f64,
}

/// Order summary returned by the order backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    /// Backend order id, once created.
    #[serde(default)]
    pub order_id: Option<String>,
    /// Human-facing order number.
    #[serde(default)]
    pub order_number: Option<String>,
    /// Ordered lines.
    #[serde(default)]
    pub items: Vec<OrderLine>,
    /// Sum of lines.
    pub subtotal: f64,
    /// Shipping cost.
    pub shipping_cost: f64,
    /// Tax.
    pub tax: f64,
    /// Grand total.
    pub total: f64,
    /// ISO currency code.
    pub currency: String,
    /// Where the confirmation goes.
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Checkout error category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutErrorKind {
    /// Bad customer input.
    Validation,
    /// Payment declined or failed.
    Payment,
    /// Backend unreachable.
    Network,
    /// Stock problem.
    Inventory,
    /// Anything else.
    System,
}

/// Error surfaced to the checkout UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutError {
    /// Category.
    #[serde(rename = "type")]
    pub kind: CheckoutErrorKind,
    /// Machine-readable code.
    pub code: String,
    /// Display message.
    pub message: String,
    /// Field the error belongs to; `general` when absent.
    #[serde(default)]
    pub field: Option<String>,
    /// Whether retrying may help.
    #[serde(default)]
    pub retryable: bool,
}

/// In-memory checkout session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutState {
    /// Session identifier.
    pub session_id: Option<String>,
    /// Current step.
    pub current_step: CheckoutStep,
    /// Address and method.
    pub shipping_info: Option<ShippingInfo>,
    /// Payment method; restored sessions never carry card details.
    pub payment_method: Option<PaymentMethod>,
    /// Guest contact, for unauthenticated checkout.
    pub guest_info: Option<GuestInfo>,
    /// Resolved contact email.
    pub contact_email: Option<String>,
    /// Placed order summary.
    pub order_data: Option<OrderData>,
    /// Session is discarded once this passes.
    pub session_expires_at: Option<DateTime<Utc>>,
    /// Last persisted write.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Terms of sale accepted.
    pub terms_accepted: bool,
    /// Privacy policy accepted.
    pub privacy_accepted: bool,
    /// Marketing opt-in.
    pub marketing_consent: bool,
}
