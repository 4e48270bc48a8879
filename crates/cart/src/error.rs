//! Unified error handling for the cart engine.
//!
//! Provides a unified `CartError` type aggregating the per-concern errors.
//! Only validation and authentication failures reject a caller's operation;
//! persistence and remote failures are caught inside the engine, logged,
//! and surfaced as recoverable [`crate::notify::CartEvent`]s instead.

use thiserror::Error;

use hillbloom_core::ValidationError;

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::persistence::remote::RemoteError;

/// Engine-level error type for caller-facing operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The supplied cart item was rejected; no state changed.
    #[error("invalid cart item: {0}")]
    Validation(#[from] ValidationError),

    /// A remote-mode operation was attempted without an authenticated
    /// identity.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// The remote document store failed.
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// The local cache failed.
    #[error("local persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Engine configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
