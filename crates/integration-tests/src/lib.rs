//! Integration tests for FlixFuel.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p flixfuel-integration-tests
//! ```
//!
//! Every test runs against real sockets on `127.0.0.1`: a storefront server
//! built exactly as the binary builds it, with its cart in a temporary data
//! directory, and a [`FakeOrderService`] standing in for the order backend.
//!
//! # Test Categories
//!
//! - `cart_store` - cart semantics, ordering and durability through `CartStore`
//! - `storefront_api` - the JSON API over HTTP, including checkout and restart

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use flixfuel_storefront::cart::CartStore;
use flixfuel_storefront::checkout::{Checkout, HttpOrderGateway};
use flixfuel_storefront::config::StorefrontConfig;
use flixfuel_storefront::routes;
use flixfuel_storefront::state::AppState;
use flixfuel_storefront::storage::FileStore;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

async fn serve(router: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server error");
    });
    (addr, handle)
}

// =============================================================================
// Fake order service
// =============================================================================

#[derive(Clone)]
struct OrderLog {
    orders: Arc<Mutex<Vec<Value>>>,
    status: Arc<AtomicU16>,
}

/// Order backend that records every order it receives.
pub struct FakeOrderService {
    /// Base URL to configure the storefront with.
    pub url: Url,
    log: OrderLog,
    server: JoinHandle<()>,
}

impl FakeOrderService {
    /// Start accepting orders on an ephemeral port.
    pub async fn start() -> Self {
        let log = OrderLog {
            orders: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(StatusCode::CREATED.as_u16())),
        };
        let router = Router::new()
            .route("/orders", post(receive_order))
            .with_state(log.clone());
        let (addr, server) = serve(router).await;
        let url = Url::parse(&format!("http://{addr}")).expect("Invalid fake order service URL");
        Self { url, log, server }
    }

    /// Answer subsequent orders with `status` and no order body.
    pub fn fail_with(&self, status: StatusCode) {
        self.log.status.store(status.as_u16(), Ordering::SeqCst);
    }

    /// Orders received so far, as JSON.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.log
            .orders
            .lock()
            .expect("Order log poisoned")
            .clone()
    }
}

impl Drop for FakeOrderService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn receive_order(State(log): State<OrderLog>, Json(order): Json<Value>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(log.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        return (status, Json(json!({"message": "order service unavailable"})));
    }

    let mut orders = log.orders.lock().expect("Order log poisoned");
    orders.push(order);
    let id = format!("ord_{}", orders.len());
    (status, Json(json!({"_id": id, "id": id, "status": "confirmed"})))
}

// =============================================================================
// Storefront under test
// =============================================================================

/// A running storefront server.
pub struct TestStorefront {
    /// Server base URL, without a trailing slash.
    pub base_url: String,
    /// HTTP client for talking to the server.
    pub client: reqwest::Client,
    /// The server's cart store.
    pub cart: CartStore,
    server: JoinHandle<()>,
}

impl TestStorefront {
    /// Start a storefront persisting to `data_dir` and ordering from `orders`.
    ///
    /// The cart is hydrated from `data_dir` before the server accepts requests.
    pub async fn start(data_dir: &Path, orders: &Url) -> Self {
        let data_dir = data_dir.to_string_lossy().into_owned();
        let orders = orders.to_string();
        let config = StorefrontConfig::from_lookup(|key| match key {
            "CART_DATA_DIR" => Some(data_dir.clone()),
            "ORDER_API_BASE_URL" => Some(orders.clone()),
            "ORDER_API_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .expect("Invalid test configuration");

        let cart = CartStore::spawn(Arc::new(FileStore::new(&config.data_dir)));
        cart.load().await;

        let gateway = HttpOrderGateway::new(&config.order_api).expect("Failed to build gateway");
        let checkout = Checkout::new(cart.clone(), Arc::new(gateway), config.pricing);
        let app = routes::routes(AppState::new(config, cart.clone(), checkout));
        let (addr, server) = serve(app).await;

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            cart,
            server,
        }
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Wait for pending cart writes, then stop the server.
    pub async fn shutdown(self) {
        self.cart.flush().await;
        self.server.abort();
    }
}

/// A complete shipping form with the given user.
#[must_use]
pub fn checkout_body(user_id: Option<&str>) -> Value {
    json!({
        "userId": user_id,
        "shippingInfo": {
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.com",
            "phone": "555-0199",
            "address": "1 Compiler Ct",
            "city": "Arlington",
            "state": "VA",
            "zipCode": "22201"
        },
        "paymentMethod": "credit_card"
    })
}
