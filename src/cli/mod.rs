//! CLI command implementations.

pub mod cart;
pub mod checkout;

use crate::config::Config;
use crate::error::Result;
use crate::storage::{CookieStore, FileJar};
use std::sync::Arc;

/// Open the cookie jar under the configured storage path.
fn open_jar(config: &Config) -> Result<Arc<dyn CookieStore>> {
    let jar = FileJar::new(config.storage.path.clone())?;
    Ok(Arc::new(jar))
}
