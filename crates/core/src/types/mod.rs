//! Core types for FlixFuel.
//!
//! This module provides type-safe wrappers for the cart's domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use product::{ItemMetadata, ProductError, ProductRef, check_price};
pub use quantity::{Quantity, QuantityError};
pub use status::*;
