//! FlixFuel Core - Cart domain types and the cart state machine.
//!
//! This crate provides the types shared by every FlixFuel component:
//! - `storefront` - Cart store, persistence, checkout and the HTTP surface
//! - `cli` - Command-line cart driver
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no storage access, no HTTP clients. Persistence and observation are layered
//! on top by `flixfuel-storefront`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, quantities and product data
//! - [`cart`] - Line items, the cart state machine and derived totals
//! - [`summary`] - Order summary (subtotal, shipping, tax) under a pricing policy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod summary;
pub mod types;

pub use cart::{CART_STORAGE_KEY, CartError, CartEvent, CartLineItem, CartState};
pub use summary::{OrderSummary, PricingPolicy};
pub use types::*;
