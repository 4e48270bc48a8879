//! The remote document store collaborator.
//!
//! One cart document exists per authenticated user. The engine needs three
//! capabilities: a one-shot read, a full overwrite, and a live
//! subscription that re-delivers the document on every remote change -
//! including changes caused by this client's own writes, which is why the
//! scheduler classifies inbound snapshots before they are applied.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use hillbloom_core::{CartDocument, UserId};

/// Errors from the remote document store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The transport is down or the endpoint is gone; remote-mode writes
    /// are disabled for the session when this surfaces.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the document.
    #[error("remote document rejected: {0}")]
    Rejected(String),

    /// A delivered payload did not decode.
    #[error("remote payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// Whether this failure should latch remote sync off for the session.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A change delivered by the live subscription.
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    /// The latest full document.
    Changed(CartDocument),
    /// The document does not (or no longer) exist.
    Absent,
}

/// Live subscription handle; dropping it unsubscribes.
#[derive(Debug)]
pub struct RemoteWatch {
    receiver: mpsc::Receiver<RemoteEvent>,
}

impl RemoteWatch {
    /// Wrap a channel fed by a store implementation.
    #[must_use]
    pub const fn new(receiver: mpsc::Receiver<RemoteEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next remote change; `None` once the store stops
    /// delivering.
    pub async fn recv(&mut self) -> Option<RemoteEvent> {
        self.receiver.recv().await
    }
}

/// Per-user remote cart document storage with live change delivery.
pub trait RemotePersistence: Send + Sync + 'static {
    /// One-shot read of the user's document; `None` when it was never
    /// written.
    fn get(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<CartDocument>, RemoteError>> + Send;

    /// Full overwrite of the user's document, creating it on first write.
    fn set(
        &self,
        user: &UserId,
        document: CartDocument,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Open a live subscription on the user's document.
    ///
    /// The watch delivers the current state first, then every subsequent
    /// change, echoes of this client's own writes included.
    fn subscribe(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<RemoteWatch, RemoteError>> + Send;
}
