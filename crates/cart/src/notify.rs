//! Synchronous fan-out of cart snapshots.
//!
//! The bus keeps an explicit typed observer list. Subscribers are invoked
//! synchronously, in the same execution turn as the mutation that produced
//! the snapshot, so perceived latency for local actions is zero. After the
//! callback fan-out, one structured [`CartEvent`] is broadcast for
//! decoupled consumers (badge counters, analytics) that do not want a
//! closure registration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;

use hillbloom_core::Cart;

/// Broadcast channel depth for decoupled consumers.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Structured engine events for decoupled consumers.
#[derive(Debug, Clone)]
pub enum CartEvent {
    /// The cart changed; carries the new total item count.
    Updated { item_count: u32 },
    /// A remote write failed; in-memory state is unaffected and the next
    /// mutation retries.
    SyncFailed { message: String },
    /// The remote transport is unavailable; remote writes are disabled for
    /// the rest of the session.
    RemoteDisabled { reason: String },
}

type SnapshotCallback = Arc<dyn Fn(&Cart) + Send + Sync + 'static>;

/// Fan-out hub for cart snapshots and engine events.
///
/// Cheaply cloneable; clones share the observer list and event channel.
#[derive(Clone)]
pub struct NotificationBus {
    shared: Arc<BusShared>,
}

struct BusShared {
    state: Mutex<BusState>,
    events: broadcast::Sender<CartEvent>,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<(u64, SnapshotCallback)>,
    next_id: u64,
    last: Option<Cart>,
}

impl NotificationBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(BusShared {
                state: Mutex::new(BusState::default()),
                events,
            }),
        }
    }

    /// Register a snapshot observer.
    ///
    /// If a snapshot has already been emitted at least once, the callback
    /// immediately receives the latest one. The returned [`Subscription`]
    /// unregisters the observer when dropped.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&Cart) + Send + Sync + 'static) -> Subscription {
        let callback: SnapshotCallback = Arc::new(callback);
        let (id, replay) = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, Arc::clone(&callback)));
            (id, state.last.clone())
        };
        // Replay outside the lock so the callback may subscribe again.
        if let Some(cart) = replay {
            callback(&cart);
        }
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Deliver a snapshot to every observer, then broadcast the update
    /// event.
    pub fn emit(&self, cart: &Cart) {
        let callbacks: Vec<SnapshotCallback> = {
            let mut state = self.lock();
            state.last = Some(cart.clone());
            state
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };
        for callback in callbacks {
            callback(cart);
        }
        let _ = self.shared.events.send(CartEvent::Updated {
            item_count: item_count(cart),
        });
    }

    /// Broadcast a non-snapshot engine event.
    pub fn emit_event(&self, event: CartEvent) {
        let _ = self.shared.events.send(event);
    }

    /// Open a receiver on the structured event channel.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CartEvent> {
        self.shared.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered observer; dropping it unsubscribes.
pub struct Subscription {
    shared: Weak<BusShared>,
    id: u64,
}

impl Subscription {
    /// Explicitly unregister the observer.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Total quantity across the cart, ignoring malformed non-positive values.
#[must_use]
pub fn item_count(cart: &Cart) -> u32 {
    cart.items
        .iter()
        .map(|item| item.quantity)
        .filter(|quantity| *quantity > 0)
        .fold(0_u32, u32::saturating_add)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use hillbloom_core::{Cart, CurrencyCode, ItemDraft};

    use super::*;

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

    #[test]
    fn test_subscriber_receives_emitted_snapshot() {
        let bus = NotificationBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_callback = Arc::clone(&seen);
        let _subscription = bus.subscribe(move |cart| {
            seen_by_callback.store(item_count(cart) as usize, Ordering::SeqCst);
        });

        bus.emit(&cart_with_quantity(3));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_late_subscriber_gets_latest_snapshot_immediately() {
        let bus = NotificationBus::new();
        bus.emit(&cart_with_quantity(2));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_by_callback = Arc::clone(&seen);
        let _subscription = bus.subscribe(move |cart| {
            seen_by_callback.store(item_count(cart) as usize, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_subscription_stops_delivery() {
        let bus = NotificationBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_by_callback = Arc::clone(&calls);
        let subscription = bus.subscribe(move |_| {
            calls_by_callback.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&cart_with_quantity(1));
        subscription.unsubscribe();
        bus.emit(&cart_with_quantity(2));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_emit_broadcasts_updated_event() {
        let bus = NotificationBus::new();
        let mut events = bus.events();

        bus.emit(&cart_with_quantity(4));
        match events.recv().await {
            Ok(CartEvent::Updated { item_count }) => assert_eq!(item_count, 4),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_item_count_ignores_non_positive_quantities() {
        let mut cart = cart_with_quantity(2);
        if let Some(item) = cart.items.first_mut() {
            item.quantity = 0;
        }
        assert_eq!(item_count(&cart), 0);
    }
}
