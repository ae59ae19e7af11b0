//! FlixFuel storefront - cart and checkout JSON API.
//!
//! This binary serves the cart API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - One process-wide cart, persisted to `CART_DATA_DIR` on every change
//! - Orders are forwarded to the remote order service

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use flixfuel_storefront::cart::CartStore;
use flixfuel_storefront::checkout::{Checkout, HttpOrderGateway};
use flixfuel_storefront::config::StorefrontConfig;
use flixfuel_storefront::routes;
use flixfuel_storefront::state::AppState;
use flixfuel_storefront::storage::FileStore;
use flixfuel_storefront::telemetry;

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.log_format, "flixfuel_storefront=info,tower_http=debug");

    // Hydrate the cart before accepting requests
    let storage = Arc::new(FileStore::new(&config.data_dir));
    let cart = CartStore::spawn(storage);
    let event = cart.load().await;
    tracing::info!(?event, data_dir = %config.data_dir.display(), "Cart loaded");

    let gateway =
        HttpOrderGateway::new(&config.order_api).expect("Failed to build order gateway");
    tracing::info!(endpoint = %gateway.endpoint(), "Order gateway ready");
    let checkout = Checkout::new(cart.clone(), Arc::new(gateway), config.pricing);

    let addr = config.socket_addr();
    let state = AppState::new(config, cart.clone(), checkout);

    // Build router
    let app = routes::routes(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Let queued cart writes land before exiting
    cart.flush().await;
    tracing::info!("Cart flushed");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
