//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartStore;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the cart
/// store, checkout and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cart: CartStore,
    checkout: Checkout,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `checkout` should place orders against the same `cart`.
    #[must_use]
    pub fn new(config: StorefrontConfig, cart: CartStore, checkout: Checkout) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to checkout.
    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }
}
