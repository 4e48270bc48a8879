//! The cart engine facade.
//!
//! `CartService` owns the single authoritative in-memory cart and the
//! session state, and is constructed from its collaborators (local
//! storage, remote store, identity, price resolution) so isolated
//! instances can run side by side in tests.
//!
//! The session is a tagged variant: `Guest` (cart lives only in the local
//! cache) or `Remote` (cart lives in the per-user remote document, with a
//! live subscription pump applying genuinely-newer snapshots). The only
//! transitions are the explicit [`CartService::connect`] /
//! [`CartService::disconnect`] calls; no mutation ever changes the mode.
//!
//! Every mutation runs its read-modify-write synchronously under the state
//! lock and notifies subscribers before any persistence begins, so two
//! back-to-back mutations cannot interleave and the caller always observes
//! its own change immediately.
//!
//! The service spawns background tasks for debounced writes and the
//! subscription pump, so it must live inside a Tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use hillbloom_core::{
    Cart, CartDocument, CartItem, CartMode, CurrencyCode, ItemDraft, ItemKey, UserId,
    sanitize_items,
};

use crate::config::SyncConfig;
use crate::error::CartError;
use crate::identity::{AuthenticatedUser, IdentityProvider};
use crate::merge::merge_carts;
use crate::mutation::{self, AddAction, ItemPatch};
use crate::notify::{self, CartEvent, NotificationBus, Subscription};
use crate::persistence::remote::{RemoteEvent, RemotePersistence, RemoteWatch};
use crate::persistence::{GuestCache, LocalStore};
use crate::pricing::PriceResolver;
use crate::scheduler::SyncScheduler;

/// The cart state synchronization engine.
///
/// Cheaply cloneable; clones share the same cart and session.
pub struct CartService<L, R, I, P> {
    inner: Arc<ServiceInner<L, R, I, P>>,
}

impl<L, R, I, P> Clone for CartService<L, R, I, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ServiceInner<L, R, I, P> {
    guest: GuestCache<L>,
    remote: Arc<R>,
    identity: I,
    pricing: P,
    bus: NotificationBus,
    scheduler: SyncScheduler<R>,
    currency: CurrencyCode,
    state: Mutex<SessionState>,
}

struct SessionState {
    cart: Cart,
    session: Session,
}

/// Which store currently backs the cart.
enum Session {
    Guest,
    Remote {
        user: AuthenticatedUser,
        pump: JoinHandle<()>,
    },
}

/// Where a committed snapshot goes after subscribers were notified.
enum PersistTarget {
    Guest,
    Remote(UserId),
}

impl<L, R, I, P> CartService<L, R, I, P>
where
    L: LocalStore,
    R: RemotePersistence,
    I: IdentityProvider,
    P: PriceResolver,
{
    /// Build the engine from its collaborators.
    ///
    /// The cart starts in guest mode from whatever the local cache holds
    /// (empty on first access), and the initial snapshot is emitted so the
    /// first subscriber sees state immediately.
    pub fn new(local: L, remote: R, identity: I, pricing: P, config: SyncConfig) -> Self {
        let remote = Arc::new(remote);
        let bus = NotificationBus::new();
        let guest = GuestCache::new(local, &config);
        let cart = guest.load();
        let scheduler = SyncScheduler::new(
            Arc::clone(&remote),
            bus.clone(),
            config.debounce_window,
        );

        let service = Self {
            inner: Arc::new(ServiceInner {
                guest,
                remote,
                identity,
                pricing,
                bus,
                scheduler,
                currency: config.currency,
                state: Mutex::new(SessionState {
                    cart: cart.clone(),
                    session: Session::Guest,
                }),
            }),
        };
        service.inner.bus.emit(&cart);
        service
    }

    /// A deep-cloned snapshot of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.lock().cart.clone()
    }

    /// The current session mode.
    #[must_use]
    pub fn mode(&self) -> CartMode {
        match self.inner.lock().session {
            Session::Guest => CartMode::Guest,
            Session::Remote { .. } => CartMode::Remote,
        }
    }

    /// Total quantity across the current cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        notify::item_count(&self.inner.lock().cart)
    }

    /// Register a snapshot observer; the latest snapshot is replayed
    /// immediately.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&Cart) + Send + Sync + 'static) -> Subscription {
        self.inner.bus.subscribe(callback)
    }

    /// Open a receiver on the structured event channel.
    #[must_use]
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<CartEvent> {
        self.inner.bus.events()
    }

    /// Add an item, folding it into an existing line with the same key.
    ///
    /// The price resolution collaborator is consulted first; the draft's
    /// own snapshot is only a fallback when the catalog knows nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`] when the draft has no product
    /// name or size; no state changes in that case.
    #[instrument(skip(self, draft), fields(action = ?action))]
    pub fn add_item(&self, draft: ItemDraft, action: AddAction) -> Result<Cart, CartError> {
        let mut item = draft.into_item(Utc::now())?;
        item.unit_price = self
            .inner
            .pricing
            .resolve(&item.product_id, &item.size)
            .or(item.unit_price);
        Ok(self.commit_mutation(|items| mutation::add_item(items, item, action)))
    }

    /// Set a line's quantity; zero or negative removes the line.
    #[instrument(skip(self), fields(key = %key))]
    pub fn set_quantity(&self, key: &ItemKey, quantity: i64) -> Cart {
        let key = key.clone();
        self.commit_mutation(move |items| mutation::set_quantity(items, &key, quantity))
    }

    /// Apply an integer delta to a line's quantity; a result at or below
    /// zero removes the line.
    #[instrument(skip(self), fields(key = %key))]
    pub fn increment(&self, key: &ItemKey, delta: i64) -> Cart {
        let key = key.clone();
        self.commit_mutation(move |items| mutation::increment(items, &key, delta))
    }

    /// Remove a line if present.
    #[instrument(skip(self), fields(key = %key))]
    pub fn remove_item(&self, key: &ItemKey) -> Cart {
        let key = key.clone();
        self.commit_mutation(move |items| mutation::remove(items, &key))
    }

    /// Merge the defined fields of a patch into an existing line.
    #[instrument(skip(self, patch), fields(key = %key))]
    pub fn update_item(&self, key: &ItemKey, patch: ItemPatch) -> Cart {
        let key = key.clone();
        self.commit_mutation(move |items| mutation::update_details(items, &key, patch))
    }

    /// Switch to remote mode for the signed-in user.
    ///
    /// Runs one merge pass: unmerged guest changes are folded into the
    /// remote cart by key (quantities summed), the union is persisted as
    /// the new remote document, and the guest cache is stamped - not
    /// deleted - so a later sign-out can restore it. Re-connecting with no
    /// new guest changes leaves the remote cart untouched. An item staged
    /// before sign-in is then added through the normal pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AuthRequired`] when no user is signed in, and
    /// [`CartError::Remote`] when the remote store cannot be reached; the
    /// session stays in guest mode and the in-memory cart is untouched.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<Cart, CartError> {
        let user = self.inner.identity.current_user().ok_or_else(|| {
            CartError::AuthRequired("sign in to sync your cart".to_owned())
        })?;

        // Already bound to this user: connect is a no-op.
        {
            let state = self.inner.lock();
            if let Session::Remote { user: current, .. } = &state.session
                && current.uid == user.uid
            {
                return Ok(state.cart.clone());
            }
        }
        // Bound to someone else: drop that session first.
        if self.mode() == CartMode::Remote {
            self.disconnect();
        }

        let remote_document = self.inner.remote.get(&user.uid).await?;
        let remote_version = remote_document.as_ref().map_or(0, |doc| doc.version);
        let remote_cart = remote_document.map_or_else(
            || Cart::empty(self.inner.currency),
            CartDocument::into_cart,
        );
        let guest_cart = self.inner.guest.load();
        let unmerged = guest_cart.meta.has_unmerged_changes();

        self.inner.scheduler.reset(remote_version);

        let now = Utc::now();
        let mut cart = if unmerged {
            merge_carts(&remote_cart, &guest_cart)
        } else {
            remote_cart
        };
        cart.updated_at = Some(now);
        cart.meta.mode = CartMode::Remote;

        if unmerged {
            let generation = self.inner.scheduler.advance_generation();
            let document = CartDocument::from_cart(&user.uid, &cart, generation, now);
            match self.inner.remote.set(&user.uid, document).await {
                Ok(()) => {
                    // The union is durable; stamp the guest cache so this
                    // snapshot is never merged again.
                    let mut stamped = guest_cart;
                    stamped.meta.last_merged_at = stamped.meta.last_mutated_at;
                    if let Err(error) = self.inner.guest.save(&stamped) {
                        warn!(error = %error, "could not stamp guest cart after merge");
                    }
                }
                Err(error) if error.is_unavailable() => {
                    self.inner.scheduler.disable(&error.to_string());
                    return Err(error.into());
                }
                Err(error) => {
                    warn!(error = %error, "could not persist merged cart, next mutation retries");
                    self.inner.bus.emit_event(CartEvent::SyncFailed {
                        message: error.to_string(),
                    });
                }
            }
        }

        // Subscribe after the union write: the watch opens on the written
        // state, so the first delivery is classified as our own echo
        // instead of a pre-merge document that would rewind the cart.
        let watch = self.inner.remote.subscribe(&user.uid).await?;

        {
            let mut state = self.inner.lock();
            let pump = tokio::spawn(run_pump(Arc::downgrade(&self.inner), watch));
            state.cart = cart.clone();
            state.session = Session::Remote {
                user: user.clone(),
                pump,
            };
        }
        self.inner.bus.emit(&cart);

        // An item picked before sign-in joins the cart now.
        if let Some(draft) = self.inner.guest.take_pending(now) {
            match self.add_item(draft, AddAction::Add) {
                Ok(updated) => return Ok(updated),
                Err(error) => warn!(error = %error, "staged cart item was invalid, dropping it"),
            }
        }

        Ok(cart)
    }

    /// Revert to guest mode, restoring the previously cached guest cart.
    ///
    /// A merely-scheduled remote write is superseded; a write already in
    /// flight runs to completion.
    #[instrument(skip(self))]
    pub fn disconnect(&self) -> Cart {
        self.inner.scheduler.cancel_pending();
        let cart = self.inner.guest.load();
        {
            let mut state = self.inner.lock();
            if let Session::Remote { pump, .. } =
                std::mem::replace(&mut state.session, Session::Guest)
            {
                pump.abort();
            }
            state.cart = cart.clone();
        }
        self.inner.bus.emit(&cart);
        cart
    }

    /// One-shot re-read of the remote document, committing it locally
    /// without scheduling an outbound write.
    ///
    /// A snapshot older than this client's own writes is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AuthRequired`] in guest mode and
    /// [`CartError::Remote`] when the store cannot be read.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Cart, CartError> {
        let uid = {
            let state = self.inner.lock();
            match &state.session {
                Session::Remote { user, .. } => user.uid.clone(),
                Session::Guest => {
                    return Err(CartError::AuthRequired(
                        "connect before refreshing the remote cart".to_owned(),
                    ));
                }
            }
        };

        match self.inner.remote.get(&uid).await {
            Ok(Some(document)) => {
                if self.inner.scheduler.admit_inbound(&document) {
                    Ok(self.inner.commit_remote_snapshot(document.into_cart()))
                } else {
                    debug!("remote cart is not newer than local state");
                    Ok(self.cart())
                }
            }
            Ok(None) => Ok(self
                .inner
                .commit_remote_snapshot(Cart::empty(self.inner.currency))),
            Err(error) if error.is_unavailable() => {
                self.inner.scheduler.disable(&error.to_string());
                Err(error.into())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Drop the local cache record and reset the in-memory cart to empty.
    #[instrument(skip(self))]
    pub fn clear_local(&self) -> Cart {
        if let Err(error) = self.inner.guest.clear() {
            warn!(error = %error, "could not clear guest cart cache");
        }
        let cart = {
            let mut state = self.inner.lock();
            let mut cart = Cart::empty(self.inner.currency);
            if matches!(state.session, Session::Remote { .. }) {
                cart.meta.mode = CartMode::Remote;
            }
            state.cart = cart.clone();
            cart
        };
        self.inner.bus.emit(&cart);
        cart
    }

    /// Stage an item to be added automatically after the next sign-in.
    pub fn stage_pending_item(&self, draft: ItemDraft) {
        if let Err(error) = self.inner.guest.stage_pending(draft, Utc::now()) {
            warn!(error = %error, "could not stage cart item for after sign-in");
        }
    }

    /// Run one mutation: read-modify-write under the lock, notify
    /// subscribers, then hand the snapshot to persistence.
    fn commit_mutation(&self, mutate: impl FnOnce(Vec<CartItem>) -> Vec<CartItem>) -> Cart {
        let now = Utc::now();
        let (snapshot, target) = {
            let mut state = self.inner.lock();
            let items = mutate(state.cart.items.clone());
            state.cart.items = sanitize_items(items);
            state.cart.updated_at = Some(now);
            state.cart.meta.last_mutated_at = Some(now);
            let target = match &state.session {
                Session::Guest => PersistTarget::Guest,
                Session::Remote { user, .. } => PersistTarget::Remote(user.uid.clone()),
            };
            (state.cart.clone(), target)
        };

        // Observable state reflects the mutation before any persistence
        // begins.
        self.inner.bus.emit(&snapshot);

        match target {
            PersistTarget::Guest => {
                if let Err(error) = self.inner.guest.save(&snapshot) {
                    warn!(error = %error, "could not persist guest cart, keeping it in memory");
                }
            }
            PersistTarget::Remote(uid) => self.inner.scheduler.schedule(uid, snapshot.clone()),
        }
        snapshot
    }
}

impl<L, R, I, P> ServiceInner<L, R, I, P>
where
    L: LocalStore,
    R: RemotePersistence,
    I: IdentityProvider,
    P: PriceResolver,
{
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory cart with a remote snapshot, skipping
    /// persistence entirely. Dropped if the remote session ended while the
    /// snapshot was in flight.
    fn commit_remote_snapshot(&self, mut cart: Cart) -> Cart {
        cart.meta.mode = CartMode::Remote;
        {
            let mut state = self.lock();
            if !matches!(state.session, Session::Remote { .. }) {
                return state.cart.clone();
            }
            state.cart = cart.clone();
        }
        self.bus.emit(&cart);
        cart
    }
}

/// Apply live subscription events until the watch closes or the service is
/// dropped.
async fn run_pump<L, R, I, P>(inner: Weak<ServiceInner<L, R, I, P>>, mut watch: RemoteWatch)
where
    L: LocalStore,
    R: RemotePersistence,
    I: IdentityProvider,
    P: PriceResolver,
{
    // The document is created lazily, so an absent state before the first
    // delivery of an actual document is the initial snapshot of a cart
    // that was never written - not a deletion - and must not clear local
    // state that has not been flushed yet.
    let mut saw_document = false;
    while let Some(event) = watch.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            RemoteEvent::Changed(document) => {
                saw_document = true;
                if inner.scheduler.admit_inbound(&document) {
                    debug!(
                        version = document.version,
                        "applying newer remote cart snapshot"
                    );
                    inner.commit_remote_snapshot(document.into_cart());
                }
            }
            RemoteEvent::Absent if saw_document => {
                debug!("remote cart document was deleted, clearing remote cart");
                inner.commit_remote_snapshot(Cart::empty(inner.currency));
            }
            RemoteEvent::Absent => {
                debug!("remote cart document not created yet");
            }
        }
    }
}
