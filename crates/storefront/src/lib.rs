//! FlixFuel storefront library.
//!
//! Hosts the process-wide [`cart::CartStore`], its durable storage, checkout
//! against the remote order service, and the JSON API exposing both. The
//! `flixfuel-storefront` binary and `ff-cli` are thin shells around it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod telemetry;
