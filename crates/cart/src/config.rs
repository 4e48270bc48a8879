//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional; the defaults suit a single-store deployment.
//!
//! - `CART_DEBOUNCE_MS` - Quiet window before an outbound remote write
//!   (default: 900)
//! - `CART_STORAGE_KEY` - Local cache record key for the guest cart
//!   (default: `hillbloom_cart_state_v1`)
//! - `CART_PENDING_KEY` - Local record key for an item staged before
//!   sign-in (default: `hillbloom_pending_item_v1`)
//! - `CART_PENDING_TTL_SECS` - How long a staged item stays valid
//!   (default: 1800)
//! - `CART_CURRENCY` - ISO 4217 code for new carts (default: INR)

use std::time::Duration;

use thiserror::Error;

use hillbloom_core::CurrencyCode;

const DEFAULT_DEBOUNCE_MS: u64 = 900;
const DEFAULT_STORAGE_KEY: &str = "hillbloom_cart_state_v1";
const DEFAULT_PENDING_KEY: &str = "hillbloom_pending_item_v1";
const DEFAULT_PENDING_TTL_SECS: u64 = 30 * 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet window before a debounced remote write is dispatched.
    pub debounce_window: Duration,
    /// Local cache record key for the guest cart.
    pub storage_key: String,
    /// Local record key for an item staged before sign-in.
    pub pending_key: String,
    /// How long a staged item stays valid.
    pub pending_ttl: Duration,
    /// Currency assigned to newly created carts.
    pub currency: CurrencyCode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            pending_key: DEFAULT_PENDING_KEY.to_owned(),
            pending_ttl: Duration::from_secs(DEFAULT_PENDING_TTL_SECS),
            currency: CurrencyCode::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(raw) = read_var("CART_DEBOUNCE_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar("CART_DEBOUNCE_MS".to_owned(), raw.clone())
            })?;
            config.debounce_window = Duration::from_millis(millis);
        }

        if let Some(raw) = read_var("CART_STORAGE_KEY") {
            config.storage_key = raw;
        }

        if let Some(raw) = read_var("CART_PENDING_KEY") {
            config.pending_key = raw;
        }

        if let Some(raw) = read_var("CART_PENDING_TTL_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar("CART_PENDING_TTL_SECS".to_owned(), raw.clone())
            })?;
            config.pending_ttl = Duration::from_secs(secs);
        }

        if let Some(raw) = read_var("CART_CURRENCY") {
            config.currency = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar("CART_CURRENCY".to_owned(), raw.clone())
            })?;
        }

        Ok(config)
    }
}

/// Read a variable, treating empty values as unset.
fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce_window, Duration::from_millis(900));
        assert_eq!(config.storage_key, "hillbloom_cart_state_v1");
        assert_eq!(config.pending_ttl, Duration::from_secs(1800));
        assert_eq!(config.currency, CurrencyCode::INR);
    }
}
