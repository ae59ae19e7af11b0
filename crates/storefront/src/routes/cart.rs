//! Cart route handlers.
//!
//! Every mutating handler answers with the event the command produced and the
//! cart as it stands afterwards, so clients never need a second round trip.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use flixfuel_core::{CartEvent, CartLineItem, OrderSummary, Price, ProductId, ProductRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cart::{CartSnapshot, PersistHealth};
use crate::error::Result;
use crate::state::AppState;

/// Line item display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartLineItem,
    pub line_total: Decimal,
    pub line_total_display: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub revision: u64,
    pub items: Vec<CartItemView>,
    pub total: Decimal,
    pub total_display: String,
    pub item_count: u64,
}

/// Result of a cart command.
#[derive(Debug, Clone, Serialize)]
pub struct CartCommandView {
    #[serde(flatten)]
    pub event: CartEvent,
    pub cart: CartView,
}

/// Checkout totals with display strings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub subtotal_display: String,
    pub shipping_display: String,
    pub tax_display: String,
    pub total_display: String,
}

/// Persistence status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceView {
    #[serde(flatten)]
    pub health: PersistHealth,
    pub degraded: bool,
}

// =============================================================================
// Type Conversions
// =============================================================================

/// Format an amount in the storefront's currency.
fn format_price(state: &AppState, amount: Decimal) -> String {
    Price::new(amount, state.config().pricing.currency).display()
}

impl CartView {
    fn from_snapshot(state: &AppState, snapshot: &CartSnapshot) -> Self {
        Self {
            revision: snapshot.revision,
            items: snapshot
                .items
                .iter()
                .map(|item| {
                    let line_total = item.line_total();
                    CartItemView {
                        item: item.clone(),
                        line_total,
                        line_total_display: format_price(state, line_total),
                    }
                })
                .collect(),
            total: snapshot.total,
            total_display: format_price(state, snapshot.total),
            item_count: snapshot.item_count,
        }
    }
}

fn command_view(state: &AppState, event: CartEvent) -> Json<CartCommandView> {
    Json(CartCommandView {
        event,
        cart: CartView::from_snapshot(state, &state.cart().snapshot()),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Quantity update body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Show the cart.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Json<CartView> {
    Json(CartView::from_snapshot(&state, &state.cart().snapshot()))
}

/// Add one unit of a product.
///
/// Malformed products, including negative prices, are rejected with 400.
#[instrument(skip(state, product), fields(product_id = tracing::field::Empty))]
pub async fn add(
    State(state): State<AppState>,
    product: std::result::Result<Json<ProductRef>, JsonRejection>,
) -> Result<Json<CartCommandView>> {
    let Json(product) = product?;
    tracing::Span::current().record("product_id", product.product_id.as_str());
    let event = state.cart().add_item(product);
    Ok(command_view(&state, event))
}

/// Set a line item's quantity; zero or less removes it.
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    body: std::result::Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartCommandView>> {
    let Json(body) = body?;
    let event = state
        .cart()
        .update_quantity(&ProductId::new(product_id), body.quantity)?;
    Ok(command_view(&state, event))
}

/// Remove a line item.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Json<CartCommandView> {
    let event = state.cart().remove_item(&ProductId::new(product_id));
    command_view(&state, event)
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>) -> Json<CartCommandView> {
    let event = state.cart().clear();
    command_view(&state, event)
}

/// Checkout totals for the current cart.
#[instrument(skip(state))]
pub async fn summary(State(state): State<AppState>) -> Json<SummaryView> {
    let summary = state.checkout().summary();
    Json(SummaryView {
        subtotal_display: summary.subtotal_display(),
        shipping_display: summary.shipping_display(),
        tax_display: summary.tax_display(),
        total_display: summary.total_display(),
        summary,
    })
}

/// Whether the cart is being persisted.
#[instrument(skip(state))]
pub async fn persistence(State(state): State<AppState>) -> Json<PersistenceView> {
    let health = state.cart().persistence_health();
    Json(PersistenceView {
        degraded: health.is_degraded(),
        health,
    })
}
