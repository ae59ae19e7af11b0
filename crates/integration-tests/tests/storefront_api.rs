//! The storefront JSON API over real HTTP, backed by a fake order service.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use flixfuel_integration_tests::{FakeOrderService, TestStorefront, checkout_body};
use serde_json::{Value, json};

async fn add(storefront: &TestStorefront, product: Value) -> Value {
    let response = storefront
        .client
        .post(storefront.url("/cart/items"))
        .json(&product)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn get(storefront: &TestStorefront, path: &str) -> Value {
    storefront
        .client
        .get(storefront.url(path))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let orders = FakeOrderService::start().await;
    let storefront = TestStorefront::start(dir.path(), &orders.url).await;

    let response = storefront
        .client
        .get(storefront.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_cart_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let orders = FakeOrderService::start().await;

    let storefront = TestStorefront::start(dir.path(), &orders.url).await;
    add(&storefront, json!({"id": "p1", "name": "Pre-Workout", "price": "24.50"})).await;
    add(&storefront, json!({"id": "p1", "name": "Pre-Workout", "price": "24.50"})).await;
    let body = add(&storefront, json!({"id": "p2", "price": 3})).await;
    assert_eq!(body["cart"]["itemCount"], 3);
    assert_eq!(body["cart"]["totalDisplay"], "$52.00");
    storefront.shutdown().await;

    let restarted = TestStorefront::start(dir.path(), &orders.url).await;
    let cart = get(&restarted, "/cart").await;
    assert_eq!(cart["itemCount"], 3);
    assert_eq!(cart["items"][0]["productId"], "p1");
    assert_eq!(cart["items"][0]["name"], "Pre-Workout");
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(cart["total"], "52.00");
}

#[tokio::test]
async fn test_checkout_places_order_and_clears_cart() {
    let dir = tempfile::tempdir().unwrap();
    let orders = FakeOrderService::start().await;
    let storefront = TestStorefront::start(dir.path(), &orders.url).await;

    add(&storefront, json!({"productId": "p1", "unitPrice": "10"})).await;
    add(&storefront, json!({"productId": "p1", "unitPrice": "10"})).await;

    let summary = get(&storefront, "/cart/summary").await;
    assert_eq!(summary["totalDisplay"], "$26.60");

    let response = storefront
        .client
        .post(storefront.url("/checkout"))
        .json(&checkout_body(Some("u1")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["confirmation"]["orderId"], "ord_1");
    assert_eq!(receipt["confirmation"]["status"], "confirmed");

    let placed = orders.orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0]["userId"], "u1");
    assert_eq!(placed[0]["items"][0]["quantity"], 2);
    assert_eq!(placed[0]["shippingInfo"]["country"], "United States");
    assert_eq!(placed[0]["total"], "26.60");
    assert_eq!(placed[0]["reference"], receipt["reference"]);

    let cart = get(&storefront, "/cart").await;
    assert_eq!(cart["itemCount"], 0);
    storefront.shutdown().await;
    assert!(!dir.path().join("cart.json").exists());
}

#[tokio::test]
async fn test_checkout_failure_keeps_cart() {
    let dir = tempfile::tempdir().unwrap();
    let orders = FakeOrderService::start().await;
    orders.fail_with(StatusCode::SERVICE_UNAVAILABLE);
    let storefront = TestStorefront::start(dir.path(), &orders.url).await;

    add(&storefront, json!({"productId": "p1", "unitPrice": "10"})).await;

    let response = storefront
        .client
        .post(storefront.url("/checkout"))
        .json(&checkout_body(Some("u1")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Failed to place order. Please try again.");

    assert_eq!(get(&storefront, "/cart").await["itemCount"], 1);
    assert!(orders.orders().is_empty());
}

#[tokio::test]
async fn test_checkout_validation() {
    let dir = tempfile::tempdir().unwrap();
    let orders = FakeOrderService::start().await;
    let storefront = TestStorefront::start(dir.path(), &orders.url).await;
    add(&storefront, json!({"productId": "p1", "unitPrice": "10"})).await;

    let mut incomplete = checkout_body(Some("u1"));
    incomplete["shippingInfo"]["city"] = json!("");
    let cases = [
        (checkout_body(None), StatusCode::UNAUTHORIZED),
        (incomplete, StatusCode::UNPROCESSABLE_ENTITY),
    ];
    for (body, expected) in cases {
        let response = storefront
            .client
            .post(storefront.url("/checkout"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }

    assert!(orders.orders().is_empty());
    assert_eq!(get(&storefront, "/cart").await["itemCount"], 1);
}
