//! cartkeep - Cart and checkout session persistence.
//!
//! Keeps a shopping cart and a multi-step checkout session alive across
//! page reloads by writing them to cookies. Cart writes are debounced;
//! checkout writes happen on demand and never carry card details.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
