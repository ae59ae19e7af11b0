//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flixfuel_core::CartError;
use serde_json::json;
use thiserror::Error;

use crate::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart command rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order could not be placed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Request body could not be read as the expected JSON.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Checkout(err) => match err {
                CheckoutError::LoginRequired => StatusCode::UNAUTHORIZED,
                CheckoutError::EmptyCart => StatusCode::CONFLICT,
                CheckoutError::MissingShippingFields(_) | CheckoutError::InvalidEmail(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Checkout(CheckoutError::Gateway(_))) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose upstream error details to clients
        let message = match &self {
            Self::Checkout(CheckoutError::Gateway(_)) => {
                "Failed to place order. Please try again.".to_string()
            }
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use flixfuel_core::QuantityError;

    use super::*;
    use crate::checkout::OrderGatewayError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Cart(CartError::InvalidQuantity(QuantityError::Zero)), 400),
            (AppError::Checkout(CheckoutError::LoginRequired), 401),
            (AppError::Checkout(CheckoutError::EmptyCart), 409),
            (AppError::Checkout(CheckoutError::MissingShippingFields(vec!["city"])), 422),
            (
                AppError::Checkout(CheckoutError::Gateway(OrderGatewayError::Rejected {
                    status: 500,
                    body: String::new(),
                })),
                502,
            ),
            (AppError::BadRequest("x".into()), 400),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status().as_u16(), status);
        }
    }

    #[tokio::test]
    async fn test_gateway_details_hidden() {
        let err = AppError::Checkout(CheckoutError::Gateway(OrderGatewayError::Rejected {
            status: 500,
            body: "db password is hunter2".into(),
        }));
        let response = err.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Failed to place order. Please try again.");
    }
}
