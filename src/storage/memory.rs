//! In-memory cookie jar for tests and non-browser hosts.

use crate::error::Result;
use crate::storage::{CookieOptions, CookieStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    options: CookieOptions,
}

/// In-memory cookie jar.
///
/// Values live until removed; max-age is recorded but not enforced.
#[derive(Debug, Default)]
pub struct MemoryJar {
    cookies: RwLock<HashMap<String, Entry>>,
    writes: AtomicUsize,
}

impl MemoryJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Whether a cookie is currently set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Options the cookie was last written with.
    #[must_use]
    pub fn options(&self, name: &str) -> Option<CookieOptions> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|entry| entry.options.clone())
    }
}

impl CookieStore for MemoryJar {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        Ok(cookies.get(name).map(|entry| entry.value.clone()))
    }

    fn write(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.insert(
            name.to_string(),
            Entry {
                value: value.to_string(),
                options: options.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.remove(name);
        Ok(())
    }
}
