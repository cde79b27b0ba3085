//! Identifier generation for cart lines and sessions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `<prefix>_<unix-ms>_<9 random hex chars>`.
pub(crate) fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}_{}", now.timestamp_millis(), &random[..9])
}
