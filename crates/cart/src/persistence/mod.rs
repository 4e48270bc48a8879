//! Cart persistence: the guest-local cache and the remote document store.
//!
//! Local storage is a synchronous key/value collaborator supplied by the
//! host (browser origin storage, a file, an in-memory map in tests). The
//! engine never fails a mutation because this collaborator failed; cache
//! errors are logged and the in-memory cart stays authoritative.

pub mod memory;
pub mod remote;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use hillbloom_core::{Cart, CartItem, CartMeta, CartMode, CurrencyCode, ItemDraft, sanitize_items};

use crate::config::SyncConfig;

pub use memory::{MemoryLocalStore, MemoryRemoteStore};

/// Errors from the local key/value collaborator or its stored records.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading a record failed.
    #[error("local storage read failed: {0}")]
    Read(String),

    /// Writing or removing a record failed.
    #[error("local storage write failed: {0}")]
    Write(String),

    /// A stored record did not parse.
    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Synchronous local key/value storage scoped to the host origin.
pub trait LocalStore: Send + Sync + 'static {
    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Read`] when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write a record, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Write`] when the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Remove a record if present.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Write`] when the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Serialized shape of the cached guest cart.
///
/// Items are kept as raw JSON values on the way in so one malformed line
/// cannot take the whole cart down.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCart {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    currency: Option<CurrencyCode>,
    #[serde(default)]
    meta: CartMeta,
}

/// Serialized shape of an item staged before sign-in.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingRecord {
    item: ItemDraft,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// The guest cart's local cache.
///
/// Holds the full cart for unauthenticated sessions and the merge
/// bookkeeping (`last_mutated_at` / `last_merged_at`) consumed on sign-in.
/// The cache survives sign-in: it is stamped, not deleted, so a later
/// sign-out can restore it.
pub struct GuestCache<L> {
    store: L,
    storage_key: String,
    pending_key: String,
    pending_ttl: Duration,
    currency: CurrencyCode,
}

impl<L: LocalStore> GuestCache<L> {
    /// Wrap a local store with the configured record keys.
    pub fn new(store: L, config: &SyncConfig) -> Self {
        Self {
            store,
            storage_key: config.storage_key.clone(),
            pending_key: config.pending_key.clone(),
            pending_ttl: Duration::from_std(config.pending_ttl)
                .unwrap_or_else(|_| Duration::minutes(30)),
            currency: config.currency,
        }
    }

    /// Load the cached guest cart.
    ///
    /// Missing or corrupt data yields an empty guest cart, never an error;
    /// a corrupt record is removed so it cannot fail the next load too.
    pub fn load(&self) -> Cart {
        match self.try_load() {
            Ok(cart) => cart,
            Err(error) => {
                warn!(error = %error, "guest cart cache unreadable, starting empty");
                if let Err(remove_error) = self.store.remove(&self.storage_key) {
                    debug!(error = %remove_error, "could not drop corrupt guest cart record");
                }
                Cart::empty(self.currency)
            }
        }
    }

    fn try_load(&self) -> Result<Cart, PersistenceError> {
        let Some(raw) = self.store.get(&self.storage_key)? else {
            return Ok(Cart::empty(self.currency));
        };
        let record: StoredCart = serde_json::from_str(&raw)?;
        let items = record
            .items
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<CartItem>(value) {
                Ok(item) => Some(item),
                Err(error) => {
                    warn!(error = %error, "ignoring invalid cart item in local cache");
                    None
                }
            })
            .collect();

        let mut meta = record.meta;
        meta.mode = CartMode::Guest;
        Ok(Cart {
            items: sanitize_items(items),
            updated_at: record.updated_at,
            currency: record.currency.unwrap_or(self.currency),
            meta,
        })
    }

    /// Persist the full cart.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when serialization or the underlying
    /// store fails; callers log and move on.
    pub fn save(&self, cart: &Cart) -> Result<(), PersistenceError> {
        let record = StoredCart {
            items: cart
                .items
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect(),
            updated_at: cart.updated_at,
            currency: Some(cart.currency),
            meta: cart.meta,
        };
        let raw = serde_json::to_string(&record)?;
        self.store.set(&self.storage_key, &raw)
    }

    /// Drop the cached cart record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the underlying store fails.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.remove(&self.storage_key)
    }

    /// Stage an item chosen before sign-in.
    ///
    /// The stage expires after the configured TTL so a stale selection is
    /// not silently added days later.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the underlying store fails.
    pub fn stage_pending(&self, item: ItemDraft, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        let record = PendingRecord {
            item,
            created_at: now,
            expires_at: now + self.pending_ttl,
        };
        let raw = serde_json::to_string(&record)?;
        self.store.set(&self.pending_key, &raw)
    }

    /// Take the staged item, clearing the stage.
    ///
    /// Expired or corrupt stages are removed and yield nothing.
    pub fn take_pending(&self, now: DateTime<Utc>) -> Option<ItemDraft> {
        let raw = match self.store.get(&self.pending_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(error = %error, "pending cart item unreadable");
                return None;
            }
        };
        let taken = match serde_json::from_str::<PendingRecord>(&raw) {
            Ok(record) if record.expires_at > now => Some(record.item),
            Ok(_) => {
                debug!("discarding expired pending cart item");
                None
            }
            Err(error) => {
                warn!(error = %error, "discarding corrupt pending cart item");
                None
            }
        };
        if let Err(error) = self.store.remove(&self.pending_key) {
            debug!(error = %error, "could not clear pending cart item record");
        }
        taken
    }
}
