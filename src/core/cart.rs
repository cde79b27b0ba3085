//! Cart store.
//!
//! Mutations change the in-memory cart immediately and re-arm the
//! debouncer. The owner drives [`CartStore::poll`]; once the quiet window
//! passes, the cart as it stands at that moment is written to the `cart`
//! cookie.

use crate::config::{CartConfig, Config, MergeKey};
use crate::core::clock::Clock;
use crate::core::codec::{CartSnapshot, decode_cart, encode_cart, serialize_cart};
use crate::core::debounce::Debouncer;
use crate::core::ids::generate_id;
use crate::core::state::{CartItem, CartLock, CartState, Product};
use crate::error::{Error, Result};
use crate::storage::{CART_COOKIE, CookieOptions, CookieStore, NamedCookie};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// Cart with debounced cookie persistence.
pub struct CartStore {
    cookie: NamedCookie,
    clock: Arc<dyn Clock>,
    config: CartConfig,
    debouncer: Debouncer,
    state: CartState,
    lock: Option<CartLock>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl CartStore {
    /// Create an empty cart persisting through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            cookie: NamedCookie::new(store, CART_COOKIE, CookieOptions::for_cart(config)),
            clock,
            config: config.cart.clone(),
            debouncer: Debouncer::new(config.cart.debounce_ms),
            state: CartState::default(),
            lock: None,
            last_saved_at: None,
        }
    }

    /// Load any stored cart, then make sure the cart has a session id.
    ///
    /// # Errors
    ///
    /// Returns the load error; the session id is assigned either way.
    pub fn initialize(&mut self) -> Result<()> {
        let loaded = self.load_from_storage();
        if self.state.session_id.is_none() {
            self.state.session_id = Some(generate_id("cart", self.clock.now()));
        }
        loaded.map(|_| ())
    }

    /// Current contents.
    #[must_use]
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.state.items
    }

    /// Browsing session id.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.state.session_id.as_deref()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state
            .items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.state.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    /// First line holding `product_id`.
    #[must_use]
    pub fn item_by_product_id(&self, product_id: &str) -> Option<&CartItem> {
        self.state
            .items
            .iter()
            .find(|item| item.product.id == product_id)
    }

    /// Whether any line holds `product_id`.
    #[must_use]
    pub fn is_in_cart(&self, product_id: &str) -> bool {
        self.item_by_product_id(product_id).is_some()
    }

    /// When the debounced write is due, if one is pending.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<DateTime<Utc>> {
        self.debouncer.deadline()
    }

    /// When the cart was last written successfully.
    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Add `quantity` units of `product`.
    ///
    /// Merges into the line matching the configured merge key, otherwise
    /// appends a new line.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is locked, the product or quantity is
    /// invalid, or the product lacks stock.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<()> {
        self.ensure_not_locked()?;
        validate_product(&product)?;
        validate_quantity(quantity)?;

        if quantity > product.stock {
            return Err(Error::InsufficientStock {
                product_id: product.id,
                available: product.stock,
            });
        }

        let now = self.clock.now();
        let merge_key = self.config.merge_key;

        if let Some(existing) = self
            .state
            .items
            .iter_mut()
            .find(|item| same_line(merge_key, &item.product, &product))
        {
            let combined = existing.quantity.saturating_add(quantity);
            if combined > product.stock {
                return Err(Error::InsufficientStock {
                    available: product.stock.saturating_sub(existing.quantity),
                    product_id: product.id,
                });
            }
            existing.quantity = combined;
            existing.last_modified = Some(now);
            existing.product = product;
            tracing::debug!(line = %existing.id, quantity = combined, "merged into cart line");
        } else {
            let item = CartItem {
                id: generate_id("item", now),
                product,
                quantity,
                added_at: now,
                last_modified: None,
            };
            tracing::debug!(line = %item.id, product = %item.product.id, quantity, "added cart line");
            self.state.items.push(item);
        }

        self.touch(now);
        Ok(())
    }

    /// Remove the line `line_id`. Removing an absent line is a no-op.
    ///
    /// Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is locked.
    pub fn remove_item(&mut self, line_id: &str) -> Result<bool> {
        self.ensure_not_locked()?;

        let before = self.state.items.len();
        self.state.items.retain(|item| item.id != line_id);
        if self.state.items.len() == before {
            return Ok(false);
        }

        tracing::debug!(line = line_id, "removed cart line");
        self.touch(self.clock.now());
        Ok(true)
    }

    /// Set the quantity of `line_id`; `0` removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is locked, the line does not exist, or
    /// the product lacks stock.
    pub fn update_quantity(&mut self, line_id: &str, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove_item(line_id).map(|_| ());
        }
        self.ensure_not_locked()?;

        let now = self.clock.now();
        let item = self
            .state
            .items
            .iter_mut()
            .find(|item| item.id == line_id)
            .ok_or_else(|| Error::ItemNotFound(line_id.to_string()))?;

        if quantity > item.product.stock {
            return Err(Error::InsufficientStock {
                product_id: item.product.id.clone(),
                available: item.product.stock,
            });
        }

        item.quantity = quantity;
        item.last_modified = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Empty the cart. The empty cart is persisted too, replacing any
    /// earlier snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is locked.
    pub fn clear_cart(&mut self) -> Result<()> {
        self.ensure_not_locked()?;
        self.state.items.clear();
        self.touch(self.clock.now());
        Ok(())
    }

    /// Write the cart now. A successful write also drops any pending
    /// debounced write, since it would store the same cart.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the cookie write fails; the
    /// in-memory cart is unaffected.
    pub fn save_to_storage(&mut self) -> Result<()> {
        let now = self.clock.now();
        let snapshot = serialize_cart(&self.state, now);
        encode_cart(&snapshot).and_then(|raw| self.cookie.set(&raw))?;

        self.debouncer.cancel();
        self.last_saved_at = Some(now);
        tracing::debug!(
            cookie = self.cookie.name(),
            items = snapshot.items.len(),
            "cart saved"
        );
        Ok(())
    }

    /// Cancel any pending debounced write and save immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the save fails.
    pub fn flush(&mut self) -> Result<()> {
        self.debouncer.cancel();
        self.save_to_storage()
    }

    /// Read the stored cart and hydrate from it.
    ///
    /// Returns `Ok(None)` when nothing is stored. On failure the in-memory
    /// cart is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be read or fails validation.
    pub fn load_from_storage(&mut self) -> Result<Option<CartSnapshot>> {
        let Some(raw) = self.cookie.get()? else {
            return Ok(None);
        };
        let Some(snapshot) = decode_cart(&raw)? else {
            return Ok(None);
        };

        self.state.items.clone_from(&snapshot.items);
        if snapshot.session_id.is_some() {
            self.state.session_id.clone_from(&snapshot.session_id);
        }
        self.state.last_sync_at = snapshot.last_sync_at;

        tracing::debug!(items = snapshot.items.len(), "cart loaded");
        Ok(Some(snapshot))
    }

    /// Delete the cart cookie; the in-memory cart is untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be removed.
    pub fn clear_storage(&mut self) -> Result<()> {
        self.cookie.clear()?;
        self.last_saved_at = None;
        Ok(())
    }

    /// Run the debounced write if its quiet window has passed.
    ///
    /// Returns whether a write was attempted. A failed write is logged and
    /// the cart keeps working in memory.
    pub fn poll(&mut self) -> bool {
        if !self.debouncer.fire_if_due(self.clock.now()) {
            return false;
        }
        if let Err(e) = self.save_to_storage() {
            tracing::warn!(error = %e, "debounced cart save failed");
        }
        true
    }

    /// Lock the cart for `checkout_session_id` for `minutes`
    /// (the configured default when `None`).
    pub fn lock_cart(&mut self, checkout_session_id: &str, minutes: Option<u32>) {
        let now = self.clock.now();
        let minutes = minutes.unwrap_or(self.config.lock_minutes);
        let locked_until = now + Duration::minutes(i64::from(minutes));

        tracing::info!(session = checkout_session_id, until = %locked_until, "cart locked for checkout");
        self.lock = Some(CartLock {
            locked_at: now,
            locked_until,
            checkout_session_id: checkout_session_id.to_string(),
        });
    }

    /// Release the lock.
    ///
    /// A live lock held by a different session is refused; an expired one
    /// is released for anyone.
    ///
    /// # Errors
    ///
    /// Returns an error if another session holds a live lock.
    pub fn unlock_cart(&mut self, checkout_session_id: Option<&str>) -> Result<()> {
        if let (Some(lock), Some(caller)) = (&self.lock, checkout_session_id) {
            if lock.checkout_session_id != caller && self.clock.now() < lock.locked_until {
                return Err(Error::UnauthorizedUnlock(lock.checkout_session_id.clone()));
            }
        }
        self.lock = None;
        tracing::info!("cart unlocked");
        Ok(())
    }

    /// Whether a live lock is held. Releases a lapsed lock.
    pub fn is_locked(&mut self) -> bool {
        self.lock_status().is_some()
    }

    /// Current live lock, releasing a lapsed one first.
    pub fn lock_status(&mut self) -> Option<&CartLock> {
        let now = self.clock.now();
        if self
            .lock
            .as_ref()
            .is_some_and(|lock| lock.locked_until <= now)
        {
            tracing::debug!("cart lock lapsed");
            self.lock = None;
        }
        self.lock.as_ref()
    }

    /// Tear the store down, dropping any pending write.
    ///
    /// Returns whether a write was pending.
    pub fn dispose(mut self) -> bool {
        self.debouncer.cancel()
    }

    fn ensure_not_locked(&mut self) -> Result<()> {
        match self.lock_status() {
            Some(lock) => Err(Error::CartLocked {
                until: lock.locked_until,
            }),
            None => Ok(()),
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.state.last_sync_at = Some(now);
        self.debouncer.arm(now);
    }
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("cookie", &self.cookie)
            .field("state", &self.state)
            .field("lock", &self.lock)
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

fn same_line(merge_key: MergeKey, existing: &Product, incoming: &Product) -> bool {
    existing.id == incoming.id
        && match merge_key {
            MergeKey::Product => true,
            MergeKey::ProductAndAttributes => existing.attributes == incoming.attributes,
        }
}

fn validate_product(product: &Product) -> Result<()> {
    if product.id.trim().is_empty() {
        return Err(Error::Validation("product id is required".to_string()));
    }
    if product.name.trim().is_empty() {
        return Err(Error::Validation("product name is required".to_string()));
    }
    if !product.price.is_finite() || product.price < 0.0 {
        return Err(Error::Validation(format!(
            "product price must be a non-negative number, got {}",
            product.price
        )));
    }
    Ok(())
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(Error::Validation(
            "quantity must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
