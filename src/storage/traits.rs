//! Storage trait definitions.

use crate::error::Result;
use crate::storage::CookieOptions;

/// Per-client key/value store behind the named cookies.
///
/// Values are opaque strings; stores never interpret them. Any durable
/// per-client store (browser cookies, a file jar, an in-memory map)
/// satisfies this contract.
pub trait CookieStore: Send + Sync {
    /// Read a cookie value.
    ///
    /// Returns `Ok(None)` when the cookie is absent or has outlived its
    /// max-age.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn read(&self, name: &str) -> Result<Option<String>>;

    /// Write a cookie value, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn write(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()>;

    /// Delete a cookie. Deleting an absent cookie succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn remove(&self, name: &str) -> Result<()>;
}
