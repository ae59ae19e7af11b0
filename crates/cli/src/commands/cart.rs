//! Persisted cart inspection and editing.
//!
//! Each command hydrates the cart from the data directory, applies at most one
//! change, waits for it to be written, and prints the resulting cart as JSON.
//!
//! # Usage
//!
//! ```bash
//! ff-cli cart show
//! ff-cli cart add p1 --price 19.99 --name "Protein Bar"
//! ff-cli cart set p1 3
//! ff-cli cart remove p1
//! ff-cli cart summary
//! ff-cli --data-dir /tmp/ff cart clear
//! ```

use std::path::Path;
use std::sync::Arc;

use flixfuel_core::{
    CartError, CartEvent, CartLineItem, ItemMetadata, OrderSummary, PricingPolicy, ProductError,
    ProductId, ProductRef,
};
use flixfuel_storefront::cart::{CartSnapshot, CartStore};
use flixfuel_storefront::storage::FileStore;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Command argument rejected by the cart.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// Product data rejected by the cart.
    #[error("Invalid product: {0}")]
    Product(#[from] ProductError),

    /// The change was applied but could not be written.
    #[error("Failed to save cart: {0}")]
    PersistFailed(String),
}

/// A change to apply.
#[derive(Debug, Clone)]
pub enum CartChange {
    Add {
        product_id: String,
        price: Decimal,
        metadata: ItemMetadata,
    },
    Remove {
        product_id: String,
    },
    Set {
        product_id: String,
        quantity: i64,
    },
    Clear,
}

/// Cart printed after a command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartOutput {
    #[serde(flatten)]
    pub event: Option<CartEvent>,
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
    pub item_count: u64,
}

impl CartOutput {
    fn new(event: Option<CartEvent>, snapshot: &CartSnapshot) -> Self {
        Self {
            event,
            items: snapshot.items.to_vec(),
            total: snapshot.total,
            item_count: snapshot.item_count,
        }
    }
}

async fn open(data_dir: &Path) -> CartStore {
    let store = CartStore::spawn(Arc::new(FileStore::new(data_dir)));
    let event = store.load().await;
    tracing::debug!(?event, data_dir = %data_dir.display(), "Cart loaded");
    store
}

/// Print the persisted cart.
pub async fn show(data_dir: &Path) -> CartOutput {
    let store = open(data_dir).await;
    CartOutput::new(None, &store.snapshot())
}

/// Apply one change and persist it.
///
/// # Errors
///
/// Returns an error if the change is rejected or the write fails.
pub async fn apply(data_dir: &Path, change: CartChange) -> Result<CartOutput, CartCommandError> {
    let store = open(data_dir).await;

    let event = match change {
        CartChange::Add {
            product_id,
            price,
            metadata,
        } => {
            store.add_item(ProductRef::try_new(product_id, price)?.with_metadata(metadata))
        }
        CartChange::Remove { product_id } => store.remove_item(&ProductId::new(product_id)),
        CartChange::Set {
            product_id,
            quantity,
        } => store.update_quantity(&ProductId::new(product_id), quantity)?,
        CartChange::Clear => store.clear(),
    };

    store.flush().await;
    let health = store.persistence_health();
    if health.is_degraded() {
        return Err(CartCommandError::PersistFailed(
            health.last_error.unwrap_or_default(),
        ));
    }

    tracing::info!(?event, "Cart updated");
    Ok(CartOutput::new(Some(event), &store.snapshot()))
}

/// Checkout totals for the persisted cart.
pub async fn summary(data_dir: &Path, pricing: &PricingPolicy) -> OrderSummary {
    let store = open(data_dir).await;
    OrderSummary::compute(&store.items(), pricing)
}
