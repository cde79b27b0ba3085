//! Cookie write options and the named-cookie accessor.

use crate::config::{Config, CookieConfig};
use crate::error::Result;
use crate::storage::CookieStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of the cart cookie.
pub const CART_COOKIE: &str = "cart";

/// Name of the checkout session cookie.
pub const CHECKOUT_COOKIE: &str = "checkout_session";

/// Cross-site policy for a cookie.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Sent only on same-site requests.
    Strict,

    /// Sent on same-site requests and top-level navigations (default).
    #[default]
    Lax,

    /// Sent on every request; browsers require `Secure` with this.
    None,
}

/// Options applied on every write of a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Lifetime in seconds.
    pub max_age: u32,

    /// Cross-site policy.
    pub same_site: SameSite,

    /// Restrict to HTTPS.
    pub secure: bool,

    /// Cookie path.
    pub path: String,
}

impl CookieOptions {
    /// Options with the given max-age and the configured cookie policy.
    #[must_use]
    pub fn with_max_age(max_age: u32, policy: &CookieConfig) -> Self {
        Self {
            max_age,
            same_site: policy.same_site,
            secure: policy.secure,
            path: "/".to_string(),
        }
    }

    /// Options for the cart cookie.
    #[must_use]
    pub fn for_cart(config: &Config) -> Self {
        Self::with_max_age(config.cart.max_age_seconds, &config.cookies)
    }

    /// Options for the checkout cookie: lives as long as the session.
    #[must_use]
    pub fn for_checkout(config: &Config) -> Self {
        let max_age = config.checkout.session_ttl_minutes.saturating_mul(60);
        Self::with_max_age(max_age, &config.cookies)
    }
}

/// One cookie name bound to a store and its write options.
///
/// Each logical store owns exactly one accessor so every read and write
/// for that cookie goes through the same backend handle.
#[derive(Clone)]
pub struct NamedCookie {
    store: Arc<dyn CookieStore>,
    name: &'static str,
    options: CookieOptions,
}

impl NamedCookie {
    /// Bind `name` on `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>, name: &'static str, options: CookieOptions) -> Self {
        Self {
            store,
            name,
            options,
        }
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read the raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub fn get(&self) -> Result<Option<String>> {
        self.store.read(self.name)
    }

    /// Write the raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn set(&self, value: &str) -> Result<()> {
        self.store.write(self.name, value, &self.options)
    }

    /// Delete the cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(self.name)
    }
}

impl fmt::Debug for NamedCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCookie")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
