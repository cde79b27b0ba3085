//! Checkout session store.
//!
//! Unlike the cart, the session is written synchronously on demand through
//! [`CheckoutSession::persist`]. Card details are stripped on the way out,
//! and restoring a lapsed or unreadable session deletes its cookie.

use crate::config::Config;
use crate::core::clock::Clock;
use crate::core::codec::{decode_checkout, encode_checkout, serialize_checkout};
use crate::core::ids::generate_id;
use crate::core::state::{
    CheckoutError, CheckoutState, CheckoutStep, GuestInfo, OrderData, PaymentMethod, ShippingInfo,
};
use crate::error::Result;
use crate::storage::{CHECKOUT_COOKIE, CookieOptions, CookieStore, NamedCookie};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key for errors that do not belong to a form field.
pub const GENERAL_ERROR: &str = "general";

/// Fields to fold into the session before persisting. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    /// New shipping info.
    pub shipping_info: Option<ShippingInfo>,
    /// New payment method.
    pub payment_method: Option<PaymentMethod>,
}

/// Checkout session with cookie persistence.
pub struct CheckoutSession {
    cookie: NamedCookie,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: CheckoutState,
    errors: BTreeMap<String, String>,
    last_error: Option<CheckoutError>,
    validation_errors: BTreeMap<String, Vec<String>>,
}

impl CheckoutSession {
    /// Create an empty session persisting through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            cookie: NamedCookie::new(
                store,
                CHECKOUT_COOKIE,
                CookieOptions::for_checkout(config),
            ),
            clock,
            ttl: Duration::minutes(i64::from(config.checkout.session_ttl_minutes)),
            state: CheckoutState::default(),
            errors: BTreeMap::new(),
            last_error: None,
            validation_errors: BTreeMap::new(),
        }
    }

    /// Start a session: assign an id and expiry, then let a stored live
    /// session take over.
    pub fn initialize(&mut self) -> &CheckoutState {
        let now = self.clock.now();
        if self.state.session_id.is_none() {
            self.state.session_id = Some(self.generate_session_id());
        }
        self.state.session_expires_at = Some(now + self.ttl);
        self.restore();
        &self.state
    }

    /// Fresh `checkout_<ms>_<random>` id.
    #[must_use]
    pub fn generate_session_id(&self) -> String {
        generate_id("checkout", self.clock.now())
    }

    /// Current session.
    #[must_use]
    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.state.session_id.as_deref()
    }

    /// Replace the session id.
    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.state.session_id = session_id;
    }

    /// Move to `step`. Steps are recorded, not enforced.
    pub fn set_current_step(&mut self, step: CheckoutStep) {
        self.state.current_step = step;
    }

    /// Replace the shipping info without persisting.
    pub fn set_shipping_info(&mut self, shipping_info: Option<ShippingInfo>) {
        self.state.shipping_info = shipping_info;
    }

    /// Replace the payment method without persisting.
    pub fn set_payment_method(&mut self, payment_method: Option<PaymentMethod>) {
        self.state.payment_method = payment_method;
    }

    /// Set guest contact. The trimmed email also becomes the contact email.
    pub fn set_guest_info(&mut self, guest_info: Option<GuestInfo>) {
        self.state.guest_info = guest_info.map(|mut guest| {
            guest.email = guest.email.trim().to_string();
            guest
        });
        let email = self.state.guest_info.as_ref().map(|guest| guest.email.clone());
        if email.is_some() {
            self.set_contact_email(email);
        }
    }

    /// Set the contact email, mirrored onto any order summary.
    pub fn set_contact_email(&mut self, email: Option<String>) {
        let email = email.map(|e| e.trim().to_string());
        if let Some(order) = &mut self.state.order_data {
            order.customer_email.clone_from(&email);
        }
        self.state.contact_email = email;
    }

    /// Set the order summary, carrying the contact email into it when the
    /// order has none.
    pub fn set_order_data(&mut self, order_data: Option<OrderData>) {
        self.state.order_data = order_data.map(|mut order| {
            if order.customer_email.is_none() {
                order.customer_email.clone_from(&self.state.contact_email);
            }
            order
        });
    }

    /// Override the expiry instant.
    pub fn set_session_expiry(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.state.session_expires_at = expires_at;
    }

    /// Override the last write instant.
    pub fn set_last_sync_at(&mut self, at: Option<DateTime<Utc>>) {
        self.state.last_sync_at = at;
    }

    /// Record terms of sale acceptance.
    pub fn set_terms_accepted(&mut self, accepted: bool) {
        self.state.terms_accepted = accepted;
    }

    /// Record privacy policy acceptance.
    pub fn set_privacy_accepted(&mut self, accepted: bool) {
        self.state.privacy_accepted = accepted;
    }

    /// Record the marketing opt-in.
    pub fn set_marketing_consent(&mut self, consent: bool) {
        self.state.marketing_consent = consent;
    }

    /// Fold `update` into the session and write it.
    ///
    /// Stamps `last_sync_at` and assigns an expiry if the session has none.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the cookie write fails. The fold
    /// into memory has already happened by then.
    pub fn persist(&mut self, update: SessionUpdate) -> Result<()> {
        if let Some(shipping_info) = update.shipping_info {
            self.state.shipping_info = Some(shipping_info);
        }
        if let Some(payment_method) = update.payment_method {
            self.state.payment_method = Some(payment_method);
        }

        let now = self.clock.now();
        self.state.last_sync_at = Some(now);
        if self.state.session_expires_at.is_none() {
            self.state.session_expires_at = Some(now + self.ttl);
        }

        let raw = encode_checkout(&serialize_checkout(&self.state))?;
        self.cookie.set(&raw).inspect_err(|e| {
            tracing::warn!(error = %e, "failed to persist checkout session");
        })?;
        tracing::debug!(
            cookie = self.cookie.name(),
            step = %self.state.current_step,
            "checkout session persisted"
        );
        Ok(())
    }

    /// Load the stored session into memory.
    ///
    /// Returns `None` when nothing usable is stored. Expired and
    /// unreadable sessions have their cookie deleted. Never fails.
    pub fn restore(&mut self) -> Option<CheckoutState> {
        let raw = match self.cookie.get() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read checkout session");
                return None;
            }
        };

        let snapshot = match decode_checkout(&raw) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable checkout session");
                self.discard_cookie();
                return None;
            }
        };

        let now = self.clock.now();
        if snapshot
            .session_expires_at
            .is_some_and(|at| has_lapsed(at, now))
        {
            tracing::debug!("checkout session expired");
            self.discard_cookie();
            return None;
        }

        self.state = CheckoutState::from(snapshot);
        tracing::debug!(step = %self.state.current_step, "checkout session restored");
        Some(self.state.clone())
    }

    /// Delete the session cookie; memory is untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be removed.
    pub fn clear_storage(&self) -> Result<()> {
        self.cookie.clear()
    }

    /// Return to an empty session and delete the cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be removed; memory is reset
    /// regardless.
    pub fn reset(&mut self) -> Result<()> {
        self.state = CheckoutState::default();
        self.errors.clear();
        self.last_error = None;
        self.validation_errors.clear();
        self.clear_storage()
    }

    /// Position of the current step.
    #[must_use]
    pub fn current_step_index(&self) -> usize {
        self.state.current_step.index()
    }

    /// Whether the session has reached its expiry.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        self.state
            .session_expires_at
            .is_some_and(|at| has_lapsed(at, self.clock.now()))
    }

    /// Shipping is filled in and no field has validation errors.
    #[must_use]
    pub fn can_proceed_to_payment(&self) -> bool {
        self.state.shipping_info.is_some() && !self.has_validation_errors()
    }

    /// Payment is reachable and a payment method is chosen.
    #[must_use]
    pub fn can_proceed_to_review(&self) -> bool {
        self.can_proceed_to_payment() && self.state.payment_method.is_some()
    }

    /// Review is reachable, an order summary exists and the terms are
    /// accepted.
    #[must_use]
    pub fn can_complete_order(&self) -> bool {
        self.can_proceed_to_review()
            && self.state.order_data.is_some()
            && self.state.terms_accepted
    }

    /// Order grand total, `0.0` before an order exists.
    #[must_use]
    pub fn order_total(&self) -> f64 {
        self.state.order_data.as_ref().map_or(0.0, |order| order.total)
    }

    /// Record an error against its field.
    pub fn handle_error(&mut self, error: CheckoutError) {
        let field = error
            .field
            .clone()
            .unwrap_or_else(|| GENERAL_ERROR.to_string());
        tracing::debug!(field = %field, code = %error.code, "checkout error");
        self.errors.insert(field, error.message.clone());
        self.last_error = Some(error);
    }

    /// Clear one field's error, or all of them.
    pub fn clear_error(&mut self, field: Option<&str>) {
        match field {
            Some(field) => {
                self.errors.remove(field);
            }
            None => self.errors.clear(),
        }
        self.last_error = None;
    }

    /// Error message per field.
    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Most recently handled error.
    #[must_use]
    pub fn last_error(&self) -> Option<&CheckoutError> {
        self.last_error.as_ref()
    }

    /// Set the validation messages of `field`; an empty list clears it.
    pub fn set_validation_errors(&mut self, field: &str, messages: Vec<String>) {
        if messages.is_empty() {
            self.validation_errors.remove(field);
        } else {
            self.validation_errors.insert(field.to_string(), messages);
        }
    }

    /// Drop every validation message.
    pub fn clear_validation_errors(&mut self) {
        self.validation_errors.clear();
    }

    /// Drop both the error and validation messages of `field`.
    pub fn clear_field_errors(&mut self, field: &str) {
        self.errors.remove(field);
        self.validation_errors.remove(field);
    }

    /// Validation messages for `field`.
    #[must_use]
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.validation_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether any field has validation messages.
    #[must_use]
    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    fn discard_cookie(&self) {
        if let Err(e) = self.cookie.clear() {
            tracing::warn!(error = %e, "failed to delete checkout session cookie");
        }
    }
}

/// A session expiring at `expires_at` is gone from that instant on.
fn has_lapsed(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

impl fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("cookie", &self.cookie)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::state::{Address, CardDetails, CheckoutErrorKind, ShippingMethod};
    use crate::storage::MemoryJar;

    fn create_test_session() -> (CheckoutSession, Arc<MemoryJar>, Arc<ManualClock>) {
        let jar = Arc::new(MemoryJar::new());
        let clock = Arc::new(ManualClock::default());
        let session = CheckoutSession::new(jar.clone(), clock.clone(), &Config::default());
        (session, jar, clock)
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            address: Address {
                first_name: "Ana".to_string(),
                last_name: "Ruiz".to_string(),
                street: "Calle Mayor 1".to_string(),
                city: "Madrid".to_string(),
                postal_code: "28013".to_string(),
                country: "ES".to_string(),
                phone: None,
            },
            method: ShippingMethod {
                id: "standard".to_string(),
                name: "Standard".to_string(),
                description: String::new(),
                price: 4.95,
                estimated_days: 3,
            },
        }
    }

    fn card() -> CardDetails {
        CardDetails {
            number: "4111111111111111".to_string(),
            expiry_month: "12".to_string(),
            expiry_year: "2030".to_string(),
            cvc: "123".to_string(),
            holder_name: "Ana Ruiz".to_string(),
        }
    }

    fn order(total: f64) -> OrderData {
        OrderData {
            order_id: None,
            order_number: None,
            items: vec![],
            subtotal: total,
            shipping_cost: 0.0,
            tax: 0.0,
            total,
            currency: "EUR".to_string(),
            customer_email: None,
        }
    }

    #[test]
    fn initialize_assigns_id_and_expiry() {
        let (mut session, _jar, clock) = create_test_session();
        let state = session.initialize();

        assert!(state.session_id.as_deref().unwrap().starts_with("checkout_"));
        assert_eq!(
            state.session_expires_at,
            Some(clock.now() + Duration::minutes(30))
        );
    }

    #[test]
    fn persist_folds_update_and_strips_card() {
        let (mut session, jar, clock) = create_test_session();
        session
            .persist(SessionUpdate {
                shipping_info: Some(shipping()),
                payment_method: Some(PaymentMethod::card(card())),
            })
            .unwrap();

        assert_eq!(session.state().last_sync_at, Some(clock.now()));
        assert!(session.state().payment_method.as_ref().unwrap().card.is_some());

        let raw = jar.read(CHECKOUT_COOKIE).unwrap().unwrap();
        assert!(!raw.contains("4111111111111111"));
        assert!(!raw.contains("cvc"));
        assert!(raw.contains("\"type\":\"credit_card\""));
    }

    #[test]
    fn persist_keeps_fields_not_in_update() {
        let (mut session, _jar, _clock) = create_test_session();
        session.set_shipping_info(Some(shipping()));
        session.persist(SessionUpdate::default()).unwrap();

        assert_eq!(session.state().shipping_info, Some(shipping()));
    }

    #[test]
    fn restore_round_trips_without_card() {
        let (mut session, jar, clock) = create_test_session();
        session.initialize();
        session.set_current_step(CheckoutStep::Review);
        session
            .persist(SessionUpdate {
                shipping_info: Some(shipping()),
                payment_method: Some(PaymentMethod::card(card())),
            })
            .unwrap();

        let mut restored = CheckoutSession::new(jar, clock, &Config::default());
        let state = restored.restore().unwrap();

        assert_eq!(state.current_step, CheckoutStep::Review);
        assert_eq!(state.shipping_info, Some(shipping()));
        let method = state.payment_method.unwrap();
        assert!(method.card.is_none());
        assert_eq!(state.session_id, session.state().session_id);
    }

    #[test]
    fn restore_drops_expired_session() {
        let (mut session, jar, clock) = create_test_session();
        session.initialize();
        session.persist(SessionUpdate::default()).unwrap();

        clock.advance(Duration::minutes(31));
        assert!(session.restore().is_none());
        assert!(!jar.contains(CHECKOUT_COOKIE));
    }

    #[test]
    fn restore_drops_malformed_cookie() {
        let (mut session, jar, _clock) = create_test_session();
        let options = CookieOptions::for_checkout(&Config::default());
        jar.write(CHECKOUT_COOKIE, "{not json", &options).unwrap();

        assert!(session.restore().is_none());
        assert!(!jar.contains(CHECKOUT_COOKIE));
    }

    #[test]
    fn restore_without_cookie_is_none() {
        let (mut session, _jar, _clock) = create_test_session();
        assert!(session.restore().is_none());
    }

    #[test]
    fn guest_email_becomes_contact_email() {
        let (mut session, _jar, _clock) = create_test_session();
        session.set_order_data(Some(order(10.0)));
        session.set_guest_info(Some(GuestInfo {
            email: "  guest@example.com ".to_string(),
            email_updates: false,
        }));

        assert_eq!(
            session.state().contact_email.as_deref(),
            Some("guest@example.com")
        );
        assert_eq!(
            session
                .state()
                .order_data
                .as_ref()
                .unwrap()
                .customer_email
                .as_deref(),
            Some("guest@example.com")
        );
    }

    #[test]
    fn step_gates() {
        let (mut session, _jar, _clock) = create_test_session();
        assert!(!session.can_proceed_to_payment());

        session.set_shipping_info(Some(shipping()));
        assert!(session.can_proceed_to_payment());
        assert!(!session.can_proceed_to_review());

        session.set_payment_method(Some(PaymentMethod::cash()));
        assert!(session.can_proceed_to_review());
        assert!(!session.can_complete_order());

        session.set_terms_accepted(true);
        assert!(!session.can_complete_order(), "no order summary yet");

        session.set_order_data(Some(order(19.9)));
        assert!(session.can_complete_order());

        session.set_validation_errors("postalCode", vec!["required".to_string()]);
        assert!(!session.can_proceed_to_payment());
        assert_eq!(session.field_errors("postalCode").len(), 1);

        session.clear_field_errors("postalCode");
        assert!(session.can_complete_order());
    }

    #[test]
    fn errors_are_keyed_by_field() {
        let (mut session, _jar, _clock) = create_test_session();
        session.handle_error(CheckoutError {
            kind: CheckoutErrorKind::Payment,
            code: "card_declined".to_string(),
            message: "Card declined".to_string(),
            field: None,
            retryable: true,
        });

        assert_eq!(
            session.errors().get(GENERAL_ERROR).map(String::as_str),
            Some("Card declined")
        );
        assert!(session.last_error().is_some());

        session.clear_error(Some(GENERAL_ERROR));
        assert!(session.errors().is_empty());
        assert!(session.last_error().is_none());
    }

    #[test]
    fn reset_empties_session_and_cookie() {
        let (mut session, jar, _clock) = create_test_session();
        session.initialize();
        session.set_order_data(Some(order(42.0)));
        session.persist(SessionUpdate::default()).unwrap();
        assert!((session.order_total() - 42.0).abs() < f64::EPSILON);

        session.reset().unwrap();
        assert_eq!(session.state(), &CheckoutState::default());
        assert!(!jar.contains(CHECKOUT_COOKIE));
        assert!(session.order_total().abs() < f64::EPSILON);
    }

    #[test]
    fn expiry_check_uses_clock() {
        let (mut session, _jar, clock) = create_test_session();
        session.initialize();
        assert!(!session.is_session_expired());

        clock.advance(Duration::minutes(30) - Duration::milliseconds(1));
        assert!(!session.is_session_expired());

        clock.advance_ms(1);
        assert!(session.is_session_expired());
    }

    #[test]
    fn complete_order_needs_order_data() {
        let (mut session, _jar, _clock) = create_test_session();
        session.set_shipping_info(Some(shipping()));
        session.set_payment_method(Some(PaymentMethod::cash()));
        session.set_terms_accepted(true);

        assert!(session.state().order_data.is_none());
        assert!(!session.can_complete_order());
    }

    #[test]
    fn expiry_check_and_restore_agree_at_the_boundary() {
        let (mut session, _jar, clock) = create_test_session();
        session.initialize();
        session.persist(SessionUpdate::default()).unwrap();

        clock.advance(Duration::minutes(30));
        assert!(session.is_session_expired());
        assert!(session.restore().is_none());
    }
}
