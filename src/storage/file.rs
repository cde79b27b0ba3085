//! File-backed cookie jar.

use crate::error::{Error, Result};
use crate::storage::{CookieOptions, CookieStore, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// On-disk form of one cookie.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    value: String,
    expires_at: DateTime<Utc>,
    same_site: SameSite,
    secure: bool,
    path: String,
}

/// Cookie jar storing one JSON envelope per cookie, with atomic writes.
///
/// Each envelope records when the cookie expires; an expired cookie
/// reads as absent, the way a browser drops it after `max-age`.
#[derive(Debug)]
pub struct FileJar {
    base_dir: PathBuf,
}

impl FileJar {
    /// Create a new file jar.
    ///
    /// Creates the cookies directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookies directory cannot be created.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(base_dir.join("cookies"))?;
        Ok(Self { base_dir })
    }

    /// Get the path to a cookie file.
    fn cookie_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::Validation(format!("invalid cookie name: {name:?}")));
        }
        Ok(self.base_dir.join("cookies").join(format!("{name}.json")))
    }
}

impl CookieStore for FileJar {
    fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.cookie_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let envelope: Envelope = serde_json::from_str(&contents)?;
        if envelope.expires_at <= Utc::now() {
            tracing::debug!(cookie = name, "cookie past max-age, dropping");
            fs::remove_file(&path)?;
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    fn write(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let path = self.cookie_path(name)?;
        let temp = path.with_extension("tmp");

        let envelope = Envelope {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::seconds(i64::from(options.max_age)),
            same_site: options.same_site,
            secure: options.secure,
            path: options.path.clone(),
        };

        // Write to temp file first
        let contents = serde_json::to_string_pretty(&envelope)?;
        fs::write(&temp, &contents)?;

        // Atomic rename - a crash mid-write never leaves a torn cookie
        fs::rename(&temp, &path)?;

        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.cookie_path(name)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
