//! Hillbloom Cart - cart state synchronization engine.
//!
//! Keeps a shopping cart consistent across an unauthenticated ("guest",
//! local-only) session and an authenticated ("remote", cloud-synced)
//! session.
//!
//! # Architecture
//!
//! - [`service::CartService`] - the dependency-injected facade; owns the
//!   authoritative in-memory cart and the session state
//! - [`mutation`] - pure, synchronous read-modify-write operations
//! - [`notify`] - synchronous snapshot fan-out plus a broadcast event
//!   channel for decoupled consumers
//! - [`persistence`] - the guest-local cache and the remote document store
//!   behind collaborator traits
//! - [`merge`] - the one-time union of a guest cart into a remote cart on
//!   sign-in
//! - [`scheduler`] - debounced outbound remote writes and generation-based
//!   echo suppression
//!
//! Mutations commit to memory and notify subscribers before any
//! asynchronous persistence begins, so observable state always reflects
//! the caller's own most recent change regardless of network latency.
//! Persistence failures degrade the engine to local-only behavior; they
//! never roll back an applied mutation and never panic.
//!
//! # Example
//!
//! ```rust,ignore
//! use hillbloom_cart::config::SyncConfig;
//! use hillbloom_cart::identity::StaticIdentity;
//! use hillbloom_cart::persistence::{MemoryLocalStore, MemoryRemoteStore};
//! use hillbloom_cart::pricing::StaticPriceResolver;
//! use hillbloom_cart::mutation::AddAction;
//! use hillbloom_cart::service::CartService;
//! use hillbloom_core::ItemDraft;
//!
//! let service = CartService::new(
//!     MemoryLocalStore::new(),
//!     MemoryRemoteStore::new(),
//!     StaticIdentity::signed_out(),
//!     StaticPriceResolver::default(),
//!     SyncConfig::default(),
//! );
//!
//! let cart = service.add_item(ItemDraft::new("Wild Honey", "250 gram"), AddAction::Add)?;
//! assert_eq!(cart.items.len(), 1);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod mutation;
pub mod notify;
pub mod persistence;
pub mod pricing;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, SyncConfig};
pub use error::CartError;
pub use identity::{AuthenticatedUser, IdentityProvider};
pub use mutation::{AddAction, ItemPatch};
pub use notify::{CartEvent, NotificationBus, Subscription};
pub use persistence::remote::{RemoteError, RemoteEvent, RemotePersistence, RemoteWatch};
pub use persistence::{LocalStore, PersistenceError};
pub use pricing::PriceResolver;
pub use service::CartService;
