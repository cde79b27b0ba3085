//! Error types for cartkeep.

use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type alias for cartkeep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cartkeep operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage I/O error.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Stored snapshot or caller input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Requested quantity exceeds the product's stock.
    #[error("Insufficient stock for {product_id}: only {available} available")]
    InsufficientStock {
        /// Product that ran out.
        product_id: String,
        /// How many more units can still be added.
        available: u32,
    },

    /// Cart line not found.
    #[error("Item not found in cart: {0}")]
    ItemNotFound(String),

    /// Cart is locked by a checkout session.
    #[error("Cart is locked during checkout until {until}")]
    CartLocked {
        /// When the lock lapses.
        until: DateTime<Utc>,
    },

    /// Unlock attempted by a session that does not hold the lock.
    #[error("Cannot unlock cart locked by session {0}")]
    UnauthorizedUnlock(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
