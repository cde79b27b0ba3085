//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`CARTKEEP_*`)
//! 2. Config file (`~/.cartkeep/config.toml`)
//! 3. Defaults

use crate::error::{Error, Result};
use crate::storage::SameSite;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Thirty days, the lifetime of the cart cookie.
const CART_MAX_AGE_SECONDS: u32 = 60 * 60 * 24 * 30;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Cart store configuration.
    pub cart: CartConfig,

    /// Checkout session configuration.
    pub checkout: CheckoutConfig,

    /// Cookie write policy shared by both stores.
    pub cookies: CookieConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the cartkeep home directory.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_cartkeep_home(),
        }
    }
}

/// Cart store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Quiet window before a burst of mutations is written, in milliseconds.
    pub debounce_ms: u32,

    /// Cookie lifetime in seconds.
    pub max_age_seconds: u32,

    /// How `add_item` decides whether to merge into an existing line.
    pub merge_key: MergeKey,

    /// Default lock length when checkout locks the cart.
    pub lock_minutes: u32,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            max_age_seconds: CART_MAX_AGE_SECONDS,
            merge_key: MergeKey::Product,
            lock_minutes: 30,
        }
    }
}

/// Line matching rule for `add_item`.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeKey {
    /// Same product id merges into one line (default).
    #[default]
    Product,

    /// Same product id and identical chosen attributes merge.
    ProductAndAttributes,
}

impl FromStr for MergeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "product_and_attributes" => Ok(Self::ProductAndAttributes),
            other => Err(Error::Config(format!("unknown merge key: {other}"))),
        }
    }
}

/// Checkout session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Session lifetime in minutes; also the cookie max-age.
    pub session_ttl_minutes: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 30,
        }
    }
}

/// Cookie write policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cross-site policy.
    pub same_site: SameSite,

    /// Only send over HTTPS.
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            same_site: SameSite::Lax,
            secure: false,
        }
    }
}

/// Get the default cartkeep home directory.
fn default_cartkeep_home() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".cartkeep"), |h| h.join(".cartkeep"))
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or an
/// environment override holds an unparseable value.
pub fn load_config() -> Result<Config> {
    load_config_from(|name| env::var(name).ok())
}

/// Load configuration, reading variables through `var`.
fn load_config_from(var: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path(&var);
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path).map_err(Error::Storage)?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_env_overrides(&mut config, &var)?;

    Ok(config)
}

/// Get the path to the config file.
fn get_config_path(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = var("CARTKEEP_CONFIG") {
        return PathBuf::from(path);
    }

    if let Some(home) = var("CARTKEEP_HOME") {
        return PathBuf::from(home).join("config.toml");
    }

    default_cartkeep_home().join("config.toml")
}

/// Apply environment variable overrides to config.
fn apply_env_overrides(
    config: &mut Config,
    var: &impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(path) = var("CARTKEEP_STORAGE_PATH") {
        config.storage.path = PathBuf::from(path);
    } else if let Some(home) = var("CARTKEEP_HOME") {
        config.storage.path = PathBuf::from(home);
    }

    if let Some(val) = var("CARTKEEP_DEBOUNCE_MS") {
        config.cart.debounce_ms = parse_env("CARTKEEP_DEBOUNCE_MS", &val)?;
    }

    if let Some(val) = var("CARTKEEP_SESSION_TTL_MINUTES") {
        config.checkout.session_ttl_minutes = parse_env("CARTKEEP_SESSION_TTL_MINUTES", &val)?;
    }

    if let Some(val) = var("CARTKEEP_COOKIE_SECURE") {
        config.cookies.secure = parse_flag("CARTKEEP_COOKIE_SECURE", &val)?;
    }

    if let Some(val) = var("CARTKEEP_MERGE_KEY") {
        config.cart.merge_key = parse_env("CARTKEEP_MERGE_KEY", &val)?;
    }

    Ok(())
}

fn parse_flag(name: &str, val: &str) -> Result<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{name} has invalid value: {val}"))),
    }
}

fn parse_env<T: FromStr>(name: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} has invalid value: {val}")))
}
