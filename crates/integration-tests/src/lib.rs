//! Integration tests for Hillbloom.
//!
//! The suites in `tests/` drive the full cart engine against the in-memory
//! collaborator implementations, so they run without any external service:
//!
//! ```bash
//! cargo test -p hillbloom-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_cart` - Local-only cart behavior and cache degradation
//! - `cart_sync` - Sign-in merge, debounced writes, echo suppression, and
//!   cross-device delivery

use hillbloom_cart::identity::StaticIdentity;
use hillbloom_cart::persistence::{MemoryLocalStore, MemoryRemoteStore};
use hillbloom_cart::pricing::StaticPriceResolver;
use hillbloom_cart::{CartService, SyncConfig};

/// The fully in-memory engine used by every suite.
pub type TestService =
    CartService<MemoryLocalStore, MemoryRemoteStore, StaticIdentity, StaticPriceResolver>;

/// All collaborator handles next to the engine built on them, so tests can
/// observe what the engine persisted and flip availability or identity
/// mid-scenario.
pub struct Harness {
    pub local: MemoryLocalStore,
    pub remote: MemoryRemoteStore,
    pub identity: StaticIdentity,
    pub service: TestService,
}

impl Harness {
    /// A fresh engine over fresh in-memory collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// A fresh engine with a custom configuration.
    #[must_use]
    pub fn with_config(config: SyncConfig) -> Self {
        init_tracing();
        let local = MemoryLocalStore::new();
        let remote = MemoryRemoteStore::new();
        let identity = StaticIdentity::signed_out();
        let service = CartService::new(
            local.clone(),
            remote.clone(),
            identity.clone(),
            StaticPriceResolver::default(),
            config,
        );
        Self {
            local,
            remote,
            identity,
            service,
        }
    }

    /// A second engine sharing this harness's remote store and identity,
    /// as another device of the same user would.
    #[must_use]
    pub fn second_device(&self) -> TestService {
        CartService::new(
            MemoryLocalStore::new(),
            self.remote.clone(),
            self.identity.clone(),
            StaticPriceResolver::default(),
            SyncConfig::default(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
