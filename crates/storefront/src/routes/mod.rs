//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Health check
//!
//! # Cart
//! GET    /cart                 - Current cart
//! POST   /cart/items           - Add one unit of a product
//! PATCH  /cart/items/{id}      - Set a line item's quantity
//! DELETE /cart/items/{id}      - Remove a line item
//! DELETE /cart                 - Empty the cart
//! GET    /cart/summary         - Subtotal, shipping, tax and total
//! GET    /cart/persistence     - Persistence health
//!
//! # Checkout
//! POST   /checkout             - Place an order for the cart
//! ```

pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
        .route("/summary", get(cart::summary))
        .route("/persistence", get(cart::persistence))
}

/// Build the full application router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::place_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::Utc;
    use flixfuel_core::{OrderId, OrderStatus, PricingPolicy};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::cart::CartStore;
    use crate::checkout::{
        Checkout, OrderConfirmation, OrderGateway, OrderGatewayError, OrderRequest,
    };
    use crate::config::StorefrontConfig;
    use crate::storage::MemoryStore;

    struct AcceptingGateway;

    #[async_trait]
    impl OrderGateway for AcceptingGateway {
        async fn submit(&self, _: &OrderRequest) -> Result<OrderConfirmation, OrderGatewayError> {
            Ok(OrderConfirmation {
                order_id: OrderId::new("ord_9"),
                status: OrderStatus::Pending,
                placed_at: Utc::now(),
            })
        }
    }

    fn app() -> Router {
        let config = StorefrontConfig::from_lookup(|_| None).unwrap();
        let cart = CartStore::spawn(Arc::new(MemoryStore::new()));
        let checkout = Checkout::new(cart.clone(), Arc::new(AcceptingGateway), PricingPolicy::default());
        routes(AppState::new(config, cart, checkout))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_cart_flow() {
        let app = app();
        let shoes = json!({"id": 7, "name": "Shoes", "price": 10});

        let (status, body) = call(&app, Method::POST, "/cart/items", Some(shoes.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"], "added");

        let (_, body) = call(&app, Method::POST, "/cart/items", Some(shoes)).await;
        assert_eq!(body["event"], "incremented");
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["cart"]["items"][0]["productId"], "7");
        assert_eq!(body["cart"]["items"][0]["name"], "Shoes");
        assert_eq!(body["cart"]["totalDisplay"], "$20.00");

        let (status, body) = call(
            &app,
            Method::PATCH,
            "/cart/items/7",
            Some(json!({"quantity": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"]["itemCount"], 5);

        let (_, body) = call(&app, Method::GET, "/cart/summary", None).await;
        assert_eq!(body["subtotal"], "50");
        assert_eq!(body["totalDisplay"], "$59.00");

        let (_, body) = call(&app, Method::DELETE, "/cart/items/7", None).await;
        assert_eq!(body["event"], "removed");
        assert_eq!(body["cart"]["items"], json!([]));

        let (_, body) = call(&app, Method::DELETE, "/cart/items/7", None).await;
        assert_eq!(body["event"], "unchanged");
    }

    #[tokio::test]
    async fn test_update_rejects_oversized_quantity() {
        let app = app();
        call(&app, Method::POST, "/cart/items", Some(json!({"id": "p1", "price": "1"}))).await;
        let (status, body) = call(
            &app,
            Method::PATCH,
            "/cart/items/p1",
            Some(json!({"quantity": 5_000_000_000_i64})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("quantity"));
    }

    #[tokio::test]
    async fn test_add_rejects_negative_price() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/cart/items",
            Some(json!({"id": "p1", "price": "-5"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("must not be negative"));

        let (_, body) = call(&app, Method::GET, "/cart", None).await;
        assert_eq!(body["itemCount"], 0);
        assert_eq!(body["total"], "0");
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_body() {
        let app = app();
        let cases = [json!({"name": "no id", "price": 1}), json!([1, 2]), json!({"id": "p1"})];
        for product in cases {
            let (status, body) = call(&app, Method::POST, "/cart/items", Some(product)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_add_document_style_product() {
        let app = app();
        let product = json!({"_id": "a1", "id": "a1", "price": 5, "name": "Band", "quantity": 3});
        let (status, body) = call(&app, Method::POST, "/cart/items", Some(product)).await;
        assert_eq!(status, StatusCode::OK);

        let item = &body["cart"]["items"][0];
        assert_eq!(item["productId"], "a1");
        assert_eq!(item["quantity"], 1);
        assert!(item.get("_id").is_none());
        assert!(item.get("id").is_none());
        assert_eq!(body["cart"]["itemCount"], 1);
    }

    #[tokio::test]
    async fn test_checkout_flow() {
        let app = app();
        let order = json!({
            "userId": "u1",
            "shippingInfo": {
                "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com",
                "phone": "555-0100", "address": "1 Analytical Way", "city": "London",
                "state": "LDN", "zipCode": "10001"
            },
            "paymentMethod": "apple_pay"
        });

        let (status, _) = call(&app, Method::POST, "/checkout", Some(order.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        call(&app, Method::POST, "/cart/items", Some(json!({"_id": "p1", "price": 12.5}))).await;
        let (status, body) = call(&app, Method::POST, "/checkout", Some(order)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["confirmation"]["orderId"], "ord_9");
        assert_eq!(body["summary"]["subtotal"], "12.5");

        let (_, body) = call(&app, Method::GET, "/cart", None).await;
        assert_eq!(body["itemCount"], 0);
    }

    #[tokio::test]
    async fn test_checkout_requires_login() {
        let app = app();
        call(&app, Method::POST, "/cart/items", Some(json!({"id": "p1", "price": 1}))).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/checkout",
            Some(json!({"shippingInfo": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "please login to place an order");
    }

    #[tokio::test]
    async fn test_persistence_health() {
        let (status, body) = call(&app(), Method::GET, "/cart/persistence", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["degraded"], false);
        assert_eq!(body["failures"], 0);
    }
}
