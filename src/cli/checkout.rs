//! `cartkeep checkout` command implementation.

use crate::cli::open_jar;
use crate::config::{Config, load_config};
use crate::core::codec::serialize_checkout;
use crate::core::{CheckoutSession, CheckoutState, CheckoutStep, SessionUpdate, SystemClock};
use crate::error::Result;
use std::sync::Arc;

/// Show the stored checkout session as JSON, card details excluded.
///
/// # Errors
///
/// Returns an error if the configuration or cookie jar cannot be opened.
pub fn show() -> Result<()> {
    let config = load_config()?;
    let mut session = open_session(&config)?;

    match session.restore() {
        Some(state) => println!("{}", render(&state)?),
        None => println!("No active checkout session."),
    }
    Ok(())
}

/// Move the session to `step`, starting a session if none is live.
///
/// # Errors
///
/// Returns an error if the session cannot be persisted.
pub fn step(step: CheckoutStep) -> Result<()> {
    let config = load_config()?;
    let mut session = open_session(&config)?;

    session.initialize();
    session.set_current_step(step);
    session.persist(SessionUpdate::default())?;

    println!(
        "Checkout {} at step {} ({}/{})",
        session.session_id().unwrap_or("-"),
        step,
        session.current_step_index() + 1,
        CheckoutStep::ALL.len()
    );
    Ok(())
}

/// Drop the session and its cookie.
///
/// # Errors
///
/// Returns an error if the cookie cannot be removed.
pub fn reset() -> Result<()> {
    let config = load_config()?;
    let mut session = open_session(&config)?;
    session.reset()?;
    println!("Checkout session cleared.");
    Ok(())
}

fn open_session(config: &Config) -> Result<CheckoutSession> {
    Ok(CheckoutSession::new(
        open_jar(config)?,
        Arc::new(SystemClock),
        config,
    ))
}

/// Pretty JSON in the persisted shape.
fn render(state: &CheckoutState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&serialize_checkout(state))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardDetails, ManualClock, PaymentMethod};
    use crate::storage::MemoryJar;

    #[test]
    fn render_hides_card_details() {
        let mut state = CheckoutState {
            session_id: Some("checkout_1_abc".to_string()),
            current_step: CheckoutStep::Payment,
            ..CheckoutState::default()
        };
        state.payment_method = Some(PaymentMethod::card(CardDetails {
            number: "5555555555554444".to_string(),
            expiry_month: "01".to_string(),
            expiry_year: "2031".to_string(),
            cvc: "999".to_string(),
            holder_name: "Lee".to_string(),
        }));

        let out = render(&state).unwrap();
        assert!(out.contains("\"currentStep\": \"payment\""));
        assert!(!out.contains("5555555555554444"));
        assert!(!out.contains("999"));
    }

    #[test]
    fn stepping_persists_across_sessions() {
        let jar = Arc::new(MemoryJar::new());
        let clock = Arc::new(ManualClock::default());
        let config = Config::default();

        let mut first = CheckoutSession::new(jar.clone(), clock.clone(), &config);
        first.initialize();
        first.set_current_step(CheckoutStep::Review);
        first.persist(SessionUpdate::default()).unwrap();

        let mut second = CheckoutSession::new(jar, clock, &config);
        let state = second.initialize();
        assert_eq!(state.current_step, CheckoutStep::Review);
        assert_eq!(state.session_id, first.state().session_id);
    }
}
