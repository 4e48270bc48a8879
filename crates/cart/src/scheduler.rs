//! Debounced remote writes and echo suppression.
//!
//! Every remote-mode mutation (re)schedules a write of the latest cart
//! snapshot after a quiet window. A newer mutation supersedes the pending
//! one, so any burst of mutations inside one window produces exactly one
//! outbound write carrying the cumulative state. An already-dispatched
//! write runs to completion even if immediately superseded.
//!
//! Echo suppression is generation-based, not time-based: the scheduler
//! owns a monotonically increasing write generation, stamps it into each
//! outbound document as `version`, and an inbound snapshot whose version
//! is at or below the last written generation is a self-echo (or stale)
//! and must not be applied. A wall-clock guard would let a slow round trip
//! slip a stale snapshot past the guard and clobber a newer local
//! mutation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, trace, warn};

use hillbloom_core::{Cart, CartDocument, UserId};

use crate::notify::{CartEvent, NotificationBus};
use crate::persistence::remote::RemotePersistence;

/// Debounces outbound writes for one remote session.
pub struct SyncScheduler<R> {
    shared: Arc<SchedulerShared<R>>,
}

impl<R> Clone for SyncScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct SchedulerShared<R> {
    remote: Arc<R>,
    bus: NotificationBus,
    window: Duration,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    /// Bumped on every schedule; a sleeping write whose sequence no longer
    /// matches has been superseded and must not dispatch.
    scheduled_seq: u64,
    /// Generation of the newest write this client has dispatched or
    /// adopted from an applied foreign snapshot.
    write_generation: u64,
    disabled: bool,
}

impl<R: RemotePersistence> SyncScheduler<R> {
    /// Create a scheduler writing through the given remote store.
    pub fn new(remote: Arc<R>, bus: NotificationBus, window: Duration) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                remote,
                bus,
                window,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Re-arm for a new remote session: cancel any pending write, seed the
    /// write generation from the fetched document, and clear the disabled
    /// latch.
    pub fn reset(&self, generation: u64) {
        let mut state = self.shared.lock();
        state.scheduled_seq += 1;
        state.write_generation = generation;
        state.disabled = false;
    }

    /// Supersede a pending (not yet dispatched) write, if any.
    pub fn cancel_pending(&self) {
        self.shared.lock().scheduled_seq += 1;
    }

    /// Whether remote writes are latched off for this session.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.shared.lock().disabled
    }

    /// Latch remote writes off and announce it once.
    pub fn disable(&self, reason: &str) {
        self.shared.disable(reason);
    }

    /// Claim the next write generation, for writes dispatched outside the
    /// debounce window (the sign-in merge).
    pub fn advance_generation(&self) -> u64 {
        let mut state = self.shared.lock();
        state.write_generation += 1;
        state.write_generation
    }

    /// Classify an inbound snapshot; `true` means it is genuinely newer
    /// than anything this client wrote and should be applied. Applying
    /// adopts the snapshot's version as the new generation floor.
    pub fn admit_inbound(&self, document: &CartDocument) -> bool {
        let mut state = self.shared.lock();
        if document.version <= state.write_generation {
            trace!(
                version = document.version,
                generation = state.write_generation,
                "discarding echoed remote snapshot"
            );
            false
        } else {
            state.write_generation = document.version;
            true
        }
    }

    /// (Re)schedule a write of this snapshot after the quiet window.
    pub fn schedule(&self, user: UserId, cart: Cart) {
        let seq = {
            let mut state = self.shared.lock();
            if state.disabled {
                debug!("remote sync disabled, keeping cart local only");
                return;
            }
            state.scheduled_seq += 1;
            state.scheduled_seq
        };

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.window).await;

            let generation = {
                let mut state = shared.lock();
                if state.scheduled_seq != seq || state.disabled {
                    trace!("scheduled write superseded before dispatch");
                    return;
                }
                state.write_generation += 1;
                state.write_generation
            };

            let document = CartDocument::from_cart(&user, &cart, generation, Utc::now());
            match shared.remote.set(&user, document).await {
                Ok(()) => debug!(generation, "remote cart write committed"),
                Err(error) if error.is_unavailable() => {
                    shared.disable(&error.to_string());
                }
                Err(error) => {
                    warn!(error = %error, "remote cart write failed, will retry on next mutation");
                    shared.bus.emit_event(CartEvent::SyncFailed {
                        message: error.to_string(),
                    });
                }
            }
        });
    }
}

impl<R> SchedulerShared<R> {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disable(&self, reason: &str) {
        let newly_disabled = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.disabled, true)
        };
        if newly_disabled {
            warn!(reason, "remote cart sync disabled for this session");
            self.bus.emit_event(CartEvent::RemoteDisabled {
                reason: reason.to_owned(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use hillbloom_core::{CurrencyCode, ItemDraft};

    use crate::persistence::MemoryRemoteStore;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(900);

    fn scheduler(store: &MemoryRemoteStore) -> SyncScheduler<MemoryRemoteStore> {
        SyncScheduler::new(Arc::new(store.clone()), NotificationBus::new(), WINDOW)
    }

    fn cart_with_quantity(quantity: i64) -> Cart {
        let mut cart = Cart::empty(CurrencyCode::INR);
        cart.items = vec![
            ItemDraft::new("Wild Honey", "250 gram")
                .with_quantity(quantity)
                .into_item(Utc::now())
                .expect("valid draft"),
        ];
        cart
    }

    async fn drain_timers() {
        // Two full windows is enough for every pending sleep to fire under
        // the paused clock.
        tokio::time::sleep(WINDOW * 2).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_within_window_coalesce_into_one_write() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        tokio::time::advance(Duration::from_millis(100)).await;
        scheduler.schedule(user.clone(), cart_with_quantity(2));

        drain_timers().await;

        assert_eq!(store.write_count(), 1);
        let document = store.document(&user).expect("written");
        let cart = document.into_cart();
        assert_eq!(cart.items.first().map(|item| item.quantity), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_in_separate_windows_write_separately() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        drain_timers().await;
        scheduler.schedule(user.clone(), cart_with_quantity(2));
        drain_timers().await;

        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_write_is_classified_as_echo() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        drain_timers().await;

        let echoed = store.document(&user).expect("written");
        assert!(!scheduler.admit_inbound(&echoed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_newer_snapshot_is_admitted_once() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        drain_timers().await;

        let mut foreign = store.document(&user).expect("written");
        foreign.version += 1;
        assert!(scheduler.admit_inbound(&foreign));
        // Re-delivery of the same version is now stale.
        assert!(!scheduler.admit_inbound(&foreign));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_store_latches_sync_off() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");
        store.set_unavailable(true);

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        drain_timers().await;

        assert!(scheduler.is_disabled());
        assert_eq!(store.write_count(), 0);

        // Later mutations no longer even schedule.
        store.set_unavailable(false);
        scheduler.schedule(user.clone(), cart_with_quantity(2));
        drain_timers().await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_the_disabled_latch_and_seeds_generation() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");
        scheduler.disable("transport offline");
        assert!(scheduler.is_disabled());

        scheduler.reset(7);
        assert!(!scheduler.is_disabled());

        scheduler.schedule(user.clone(), cart_with_quantity(1));
        drain_timers().await;
        assert_eq!(store.document(&user).map(|doc| doc.version), Some(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_supersedes_scheduled_write() {
        let store = MemoryRemoteStore::new();
        let scheduler = scheduler(&store);
        let user = UserId::new("uid-1");

        scheduler.schedule(user, cart_with_quantity(1));
        scheduler.cancel_pending();
        drain_timers().await;

        assert_eq!(store.write_count(), 0);
    }
}
