//! Ordered write-behind persistence for the cart.
//!
//! The store enqueues one [`PersistOp`] per command while still holding its
//! lock, so the queue order is the command order. A single worker drains the
//! queue and applies each op to the [`KeyValueStore`] before taking the next
//! one. A slow or stuck write delays later writes but never a command.

use std::sync::Arc;

use flixfuel_core::{CartLineItem, CartState};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use crate::storage::{KeyValueStore, StorageError};

/// Work item for the persistence worker.
pub(crate) enum PersistOp {
    /// Write the full list of line items.
    Save {
        revision: u64,
        items: Arc<[CartLineItem]>,
    },
    /// Delete the persisted entry.
    Remove { revision: u64 },
    /// Read the persisted entry, after every earlier write.
    Load {
        reply: oneshot::Sender<Result<Option<String>, StorageError>>,
    },
    /// Acknowledge once every earlier op has been applied.
    Flush { reply: oneshot::Sender<()> },
}

/// Outcome of persistence so far.
///
/// The in-memory cart never depends on this; it lets a UI tell the user their
/// cart might not survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistHealth {
    /// Number of failed writes since the store was created.
    pub failures: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Revision of the most recent failed write.
    pub last_failed_revision: Option<u64>,
    /// Revision of the most recent successful write.
    pub last_persisted_revision: u64,
}

impl PersistHealth {
    /// Whether the latest attempted write failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.last_failed_revision
            .is_some_and(|failed| failed > self.last_persisted_revision)
    }
}

/// Drains [`PersistOp`]s into a store.
pub(crate) struct PersistWorker {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    health: watch::Sender<PersistHealth>,
}

impl PersistWorker {
    pub(crate) fn new(
        storage: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        health: watch::Sender<PersistHealth>,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            health,
        }
    }

    /// Apply ops until every sender is dropped.
    pub(crate) async fn run(self, mut ops: mpsc::UnboundedReceiver<PersistOp>) {
        while let Some(op) = ops.recv().await {
            match op {
                PersistOp::Save { revision, items } => {
                    let result = match CartState::encode(&items) {
                        Ok(blob) => self.storage.save(&self.key, &blob).await,
                        Err(e) => Err(StorageError::Encode(e)),
                    };
                    self.record(revision, "save", result);
                }
                PersistOp::Remove { revision } => {
                    let result = self.storage.remove(&self.key).await;
                    self.record(revision, "remove", result);
                }
                PersistOp::Load { reply } => {
                    let _ = reply.send(self.storage.load(&self.key).await);
                }
                PersistOp::Flush { reply } => {
                    let _ = reply.send(());
                }
            }
        }
        debug!(key = %self.key, "Cart persistence worker stopped");
    }

    fn record(&self, revision: u64, operation: &'static str, result: Result<(), StorageError>) {
        match result {
            Ok(()) => {
                debug!(key = %self.key, revision, operation, "Cart persisted");
                self.health.send_modify(|health| {
                    health.last_persisted_revision = revision;
                });
            }
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                error!(
                    error = %e,
                    key = %self.key,
                    revision,
                    operation,
                    sentry_event_id = %event_id,
                    "Failed to persist cart"
                );
                self.health.send_modify(|health| {
                    health.failures += 1;
                    health.last_error = Some(e.to_string());
                    health.last_failed_revision = Some(revision);
                });
            }
        }
    }
}
