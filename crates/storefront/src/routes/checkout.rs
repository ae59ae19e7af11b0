//! Checkout route handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::instrument;

use crate::checkout::{CheckoutRequest, OrderReceipt};
use crate::error::Result;
use crate::state::AppState;

/// Place an order for the current cart.
#[instrument(skip(state, request))]
pub async fn place_order(
    State(state): State<AppState>,
    request: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderReceipt>)> {
    let Json(request) = request?;
    let receipt = state.checkout().place_order(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
