//! In-memory collaborator implementations.
//!
//! Back the engine in tests and local development: a `HashMap`-based local
//! store and a remote store whose subscriptions are fed from a broadcast
//! channel, mirroring the delivery semantics of a real document store
//! (current state first, then every change, own writes included). Both are
//! cheaply cloneable and share state across clones so tests can observe
//! what the engine wrote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use hillbloom_core::{CartDocument, UserId};

use super::remote::{RemoteError, RemoteEvent, RemotePersistence, RemoteWatch};
use super::{LocalStore, PersistenceError};

/// Broadcast depth for remote change delivery.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// In-memory [`LocalStore`].
#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    inner: Arc<MemoryLocalInner>,
}

#[derive(Default)]
struct MemoryLocalInner {
    records: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryLocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, for exercising degraded paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.records().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write("writes disabled".to_owned()));
        }
        self.records().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write("writes disabled".to_owned()));
        }
        self.records().remove(key);
        Ok(())
    }
}

/// In-memory [`RemotePersistence`] with live change delivery.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<MemoryRemoteInner>,
}

struct MemoryRemoteInner {
    documents: Mutex<HashMap<UserId, CartDocument>>,
    changes: broadcast::Sender<(UserId, Option<CartDocument>)>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryRemoteInner {
                documents: Mutex::new(HashMap::new()),
                changes,
                unavailable: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate the transport going down (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `set` calls that reached the store.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Read a stored document directly, bypassing availability.
    #[must_use]
    pub fn document(&self, user: &UserId) -> Option<CartDocument> {
        self.documents().get(user).cloned()
    }

    /// Seed or overwrite a document as if another client wrote it,
    /// notifying subscribers.
    pub fn insert_document(&self, document: CartDocument) {
        let user = document.user_id.clone();
        self.documents().insert(user.clone(), document.clone());
        let _ = self.inner.changes.send((user, Some(document)));
    }

    /// Delete a document as if another client removed it, notifying
    /// subscribers with the absent state.
    pub fn remove_document(&self, user: &UserId) {
        self.documents().remove(user);
        let _ = self.inner.changes.send((user.clone(), None));
    }

    fn documents(&self) -> MutexGuard<'_, HashMap<UserId, CartDocument>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("transport offline".to_owned()));
        }
        Ok(())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemotePersistence for MemoryRemoteStore {
    fn get(
        &self,
        user: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<CartDocument>, RemoteError>> + Send {
        let result = self.check_available().map(|()| self.document(user));
        async move { result }
    }

    fn set(
        &self,
        user: &UserId,
        mut document: CartDocument,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send {
        let result = self.check_available().map(|()| {
            document.updated_at = Some(Utc::now());
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
            self.documents().insert(user.clone(), document.clone());
            let _ = self.inner.changes.send((user.clone(), Some(document)));
        });
        async move { result }
    }

    fn subscribe(
        &self,
        user: &UserId,
    ) -> impl std::future::Future<Output = Result<RemoteWatch, RemoteError>> + Send {
        let result = self.check_available().map(|()| {
            let user = user.clone();
            let initial = self
                .document(&user)
                .map_or(RemoteEvent::Absent, RemoteEvent::Changed);
            let mut changes = self.inner.changes.subscribe();
            let (tx, rx) = mpsc::channel(16);

            tokio::spawn(async move {
                if tx.send(initial).await.is_err() {
                    return;
                }
                loop {
                    match changes.recv().await {
                        Ok((changed_user, document)) if changed_user == user => {
                            let event =
                                document.map_or(RemoteEvent::Absent, RemoteEvent::Changed);
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            RemoteWatch::new(rx)
        });
        async move { result }
    }
}
