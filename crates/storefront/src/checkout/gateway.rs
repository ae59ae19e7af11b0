//! Client for the remote order service.
//!
//! Orders are POSTed as JSON to `<base_url>/orders`. The service answers with
//! the stored order; only its ID, status and creation time are read back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flixfuel_core::{OrderId, OrderStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::OrderRequest;
use crate::config::OrderApiConfig;

/// Errors from submitting an order.
#[derive(Debug, Error)]
pub enum OrderGatewayError {
    /// Request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("order service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Response body was not an order.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Base URL cannot carry a path.
    #[error("invalid order service URL: {0}")]
    InvalidUrl(String),
}

/// The order service's acknowledgement of a placed order.
///
/// The ID is read from `orderId`, `_id` or `id`, first non-null wins; the
/// time from `placedAt` or `createdAt`, defaulting to now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ConfirmationFields")]
pub struct OrderConfirmation {
    /// ID assigned by the service.
    pub order_id: OrderId,
    /// Status reported by the service.
    pub status: OrderStatus,
    /// When the service recorded the order.
    pub placed_at: DateTime<Utc>,
}

/// Order service response as received.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationFields {
    #[serde(default)]
    order_id: Option<OrderId>,
    #[serde(default, rename = "_id")]
    document_id: Option<OrderId>,
    #[serde(default)]
    id: Option<OrderId>,
    #[serde(default)]
    status: OrderStatus,
    #[serde(default)]
    placed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConfirmationFields> for OrderConfirmation {
    type Error = &'static str;

    fn try_from(fields: ConfirmationFields) -> Result<Self, Self::Error> {
        let order_id = fields
            .order_id
            .or(fields.document_id)
            .or(fields.id)
            .ok_or("order response has no orderId, _id or id")?;
        Ok(Self {
            order_id,
            status: fields.status,
            placed_at: fields.placed_at.or(fields.created_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Destination for placed orders.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit an order and return the service's confirmation.
    async fn submit(&self, order: &OrderRequest) -> Result<OrderConfirmation, OrderGatewayError>;
}

/// [`OrderGateway`] backed by the order service's REST API.
#[derive(Clone)]
pub struct HttpOrderGateway {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpOrderGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrderGateway")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpOrderGateway {
    /// Build a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot take a path or the HTTP client
    /// cannot be built.
    pub fn new(config: &OrderApiConfig) -> Result<Self, OrderGatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("FlixFuel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: orders_endpoint(&config.base_url)?,
            token: config.token.clone(),
        })
    }

    /// URL orders are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[tracing::instrument(skip(self, order), fields(reference = %order.reference, lines = order.items.len()))]
    async fn submit(&self, order: &OrderRequest) -> Result<OrderConfirmation, OrderGatewayError> {
        let mut request = self.client.post(self.endpoint.clone()).json(order);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Order service returned non-success status"
            );
            return Err(OrderGatewayError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse order service response"
            );
            OrderGatewayError::Parse(e)
        })
    }
}

fn orders_endpoint(base: &Url) -> Result<Url, OrderGatewayError> {
    let mut endpoint = base.clone();
    endpoint
        .path_segments_mut()
        .map_err(|()| OrderGatewayError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .push("orders");
    Ok(endpoint)
}
