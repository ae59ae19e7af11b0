//! The cart store shared by every screen.
//!
//! [`CartStore`] wraps the pure [`CartState`] machine from `flixfuel-core` with
//! the three things a running app needs:
//!
//! - **Serialization** - each command runs read, compute and replace inside one
//!   mutex critical section, so concurrent commands are never lost.
//! - **Write-through persistence** - at the end of the critical section the
//!   store takes an owned snapshot and queues it for the persistence worker.
//!   Writes reach storage in command order; failures are logged and reported
//!   through [`PersistHealth`] but never undo the in-memory change.
//! - **Observation** - every command publishes a [`CartSnapshot`] on a watch
//!   channel before returning.
//!
//! The store is a cheap `Arc` handle. Construct one at startup, hydrate it with
//! [`CartStore::load`], and inject clones wherever the cart is needed.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::spawn(Arc::new(FileStore::new(".flixfuel")));
//! store.load().await;
//!
//! store.add_item(ProductRef::new("p1", Decimal::from(10)));
//! assert_eq!(store.item_count(), 1);
//! ```

mod persist;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flixfuel_core::{
    CART_STORAGE_KEY, CartError, CartEvent, CartLineItem, CartState, ProductId, ProductRef,
};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, instrument, warn};

pub use persist::PersistHealth;
use persist::{PersistOp, PersistWorker};

use crate::storage::KeyValueStore;

/// Immutable view of the cart after a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Command counter at the time of the snapshot.
    pub revision: u64,
    /// Line items in insertion order.
    pub items: Arc<[CartLineItem]>,
    /// Sum of `unit_price × quantity`.
    pub total: Decimal,
    /// Sum of quantities.
    pub item_count: u64,
}

impl CartSnapshot {
    fn capture(cart: &CartState, revision: u64) -> Self {
        Self {
            revision,
            items: Arc::from(cart.items()),
            total: cart.total(),
            item_count: cart.item_count(),
        }
    }

    /// Line item for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }
}

struct Guarded {
    cart: CartState,
    revision: u64,
    hydrated: bool,
}

struct CartStoreInner {
    guarded: Mutex<Guarded>,
    persist: mpsc::UnboundedSender<PersistOp>,
    snapshots: watch::Sender<CartSnapshot>,
    health: watch::Receiver<PersistHealth>,
}

/// Process-wide cart, shared by cloning.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CartStore")
            .field("revision", &snapshot.revision)
            .field("lines", &snapshot.items.len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty store and start its persistence worker.
    ///
    /// The worker runs until the last clone of the store is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(storage: Arc<dyn KeyValueStore>) -> Self {
        let (persist, ops) = mpsc::unbounded_channel();
        let (health_tx, health) = watch::channel(PersistHealth::default());
        let worker = PersistWorker::new(storage, CART_STORAGE_KEY, health_tx);
        tokio::spawn(worker.run(ops));

        let cart = CartState::new();
        let (snapshots, _) = watch::channel(CartSnapshot::capture(&cart, 0));

        Self {
            inner: Arc::new(CartStoreInner {
                guarded: Mutex::new(Guarded {
                    cart,
                    revision: 0,
                    hydrated: false,
                }),
                persist,
                snapshots,
                health,
            }),
        }
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    /// Read the persisted cart and hydrate from it.
    ///
    /// Never fails: unreadable storage and malformed data are logged and
    /// treated as "no prior cart". The read is queued behind any writes
    /// already in flight.
    #[instrument(skip(self))]
    pub async fn load(&self) -> CartEvent {
        let persisted = match self.read_persisted().await {
            Some(blob) => match CartState::parse_persisted(&blob) {
                Ok(items) => Some(items),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted cart");
                    None
                }
            },
            None => None,
        };
        self.hydrate(persisted)
    }

    async fn read_persisted(&self) -> Option<String> {
        let (reply, response) = oneshot::channel();
        if self.inner.persist.send(PersistOp::Load { reply }).is_err() {
            error!("Cart persistence worker is not running");
            return None;
        }
        match response.await {
            Ok(Ok(blob)) => blob,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read persisted cart");
                None
            }
            Err(_) => {
                error!("Cart persistence worker dropped a load request");
                None
            }
        }
    }

    /// Replace the line items with previously persisted ones.
    ///
    /// `None` or invalid input leaves the cart empty. Idempotent, and does not
    /// write back to storage.
    pub fn hydrate(&self, persisted: Option<Vec<CartLineItem>>) -> CartEvent {
        let mut guarded = self.lock();
        if !guarded.hydrated && guarded.revision > 0 {
            warn!(
                revision = guarded.revision,
                "Cart changed before hydration; persisted state replaces it"
            );
        }

        let event = guarded.cart.hydrate(persisted).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding invalid persisted cart");
            CartEvent::Hydrated { lines: 0 }
        });
        guarded.hydrated = true;
        guarded.revision += 1;
        self.publish(&guarded);
        debug!(?event, "Cart hydrated");
        event
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Add one unit of a product.
    ///
    /// A product already in the cart keeps its original price and metadata;
    /// only its quantity goes up.
    pub fn add_item(&self, product: ProductRef) -> CartEvent {
        let product_id = product.product_id.clone();
        let event = self
            .apply(|cart| Ok(cart.add_item(product)))
            .expect("add_item command is infallible");
        debug!(%product_id, ?event, "add_item");
        event
    }

    /// Remove a product's line item. Absent products are a no-op.
    pub fn remove_item(&self, product_id: &ProductId) -> CartEvent {
        let event = self
            .apply(|cart| Ok(cart.remove_item(product_id)))
            .expect("remove_item command is infallible");
        debug!(%product_id, ?event, "remove_item");
        event
    }

    /// Set a product's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for quantities that do not fit a
    /// line item. The cart is left unchanged and nothing is persisted.
    pub fn update_quantity(&self, product_id: &ProductId, quantity: i64) -> Result<CartEvent, CartError> {
        let result = self.apply(|cart| cart.update_quantity(product_id, quantity));
        match &result {
            Ok(event) => debug!(%product_id, quantity, ?event, "update_quantity"),
            Err(e) => warn!(%product_id, quantity, error = %e, "Rejected quantity update"),
        }
        result
    }

    /// Empty the cart and delete the persisted entry.
    pub fn clear(&self) -> CartEvent {
        let event = self
            .apply(|cart| Ok(cart.clear()))
            .expect("clear command is infallible");
        debug!("clear");
        event
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The cart as of the latest command.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> Arc<[CartLineItem]> {
        Arc::clone(&self.inner.snapshots.borrow().items)
    }

    /// Sum of `unit_price × quantity`; zero when empty.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.inner.snapshots.borrow().total
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.inner.snapshots.borrow().item_count
    }

    /// Quantity of a product in the cart, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.inner
            .snapshots
            .borrow()
            .get(product_id)
            .map_or(0, |item| item.quantity.get())
    }

    /// Whether a product is in the cart.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.quantity_of(product_id) > 0
    }

    /// Receive a snapshot after every command.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshots.subscribe()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Outcome of persistence so far.
    #[must_use]
    pub fn persistence_health(&self) -> PersistHealth {
        self.inner.health.borrow().clone()
    }

    /// Receive persistence outcomes as they happen.
    #[must_use]
    pub fn subscribe_persistence(&self) -> watch::Receiver<PersistHealth> {
        self.inner.health.clone()
    }

    /// Wait until every write queued before this call has been applied or has
    /// failed.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.inner.persist.send(PersistOp::Flush { reply }).is_err() {
            error!("Cart persistence worker is not running");
            return;
        }
        if done.await.is_err() {
            error!("Cart persistence worker dropped a flush request");
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.inner
            .guarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one command as a critical section: mutate, then publish and queue
    /// the resulting snapshot before releasing the lock.
    fn apply<F>(&self, command: F) -> Result<CartEvent, CartError>
    where
        F: FnOnce(&mut CartState) -> Result<CartEvent, CartError>,
    {
        let mut guarded = self.lock();
        let event = command(&mut guarded.cart)?;
        guarded.revision += 1;

        let snapshot = self.publish(&guarded);
        let op = if snapshot.items.is_empty() {
            PersistOp::Remove {
                revision: snapshot.revision,
            }
        } else {
            PersistOp::Save {
                revision: snapshot.revision,
                items: snapshot.items,
            }
        };
        if self.inner.persist.send(op).is_err() {
            error!(
                revision = guarded.revision,
                "Cart persistence worker is not running; change kept in memory only"
            );
        }
        drop(guarded);
        Ok(event)
    }

    fn publish(&self, guarded: &Guarded) -> CartSnapshot {
        let snapshot = CartSnapshot::capture(&guarded.cart, guarded.revision);
        self.inner.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}
