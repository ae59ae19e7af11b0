//! Order placement from the current cart.
//!
//! [`Checkout::place_order`] freezes a snapshot of the cart, prices it with the
//! configured [`PricingPolicy`], and submits it through an [`OrderGateway`].
//! The cart is cleared only once the gateway confirms the order.

mod gateway;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use flixfuel_core::{
    CartLineItem, CurrencyCode, Email, EmailError, OrderSummary, PaymentMethod, PricingPolicy,
    UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use gateway::{HttpOrderGateway, OrderConfirmation, OrderGateway, OrderGatewayError};

use crate::cart::CartStore;

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("your cart is empty")]
    EmptyCart,

    /// Orders are only accepted from signed-in users.
    #[error("please login to place an order")]
    LoginRequired,

    /// Required shipping fields were left blank.
    #[error("please fill in {}", .0.join(", "))]
    MissingShippingFields(Vec<&'static str>),

    /// Contact email is not an address.
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The order service did not accept the order.
    #[error("failed to place order: {0}")]
    Gateway(#[from] OrderGatewayError),
}

fn default_country() -> String {
    "United States".to_owned()
}

/// Delivery address and contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl ShippingInfo {
    /// Check that every required field is filled in and the email parses.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingShippingFields`] naming every blank
    /// field in form order, or [`CheckoutError::InvalidEmail`].
    pub fn validate(&self) -> Result<Email, CheckoutError> {
        let required = [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip code", &self.zip_code),
        ];
        let missing: Vec<_> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| *label)
            .collect();
        if !missing.is_empty() {
            return Err(CheckoutError::MissingShippingFields(missing));
        }
        Ok(Email::parse(self.email.trim())?)
    }

    #[cfg(test)]
    pub(crate) fn example() -> Self {
        Self {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
            address: "1 Analytical Way".into(),
            city: "London".into(),
            state: "LDN".into(),
            zip_code: "10001".into(),
            country: default_country(),
        }
    }
}

/// What the buyer submits at checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Signed-in user placing the order.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub shipping_info: ShippingInfo,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Order payload sent to the order service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Client-generated reference for correlating retries and logs.
    pub reference: Uuid,
    pub user_id: UserId,
    pub items: Vec<CartLineItem>,
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
}

impl OrderRequest {
    /// Price a list of line items into an order.
    #[must_use]
    pub fn new(
        user_id: UserId,
        items: Vec<CartLineItem>,
        shipping_info: ShippingInfo,
        payment_method: PaymentMethod,
        policy: &PricingPolicy,
    ) -> Self {
        let summary = OrderSummary::compute(&items, policy);
        Self {
            reference: Uuid::new_v4(),
            user_id,
            items,
            shipping_info,
            payment_method,
            subtotal: summary.subtotal,
            shipping: summary.shipping,
            tax: summary.tax,
            total: summary.total,
            currency: summary.currency,
            created_at: Utc::now(),
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    /// Client-side reference the order was submitted under.
    pub reference: Uuid,
    pub confirmation: OrderConfirmation,
    pub summary: OrderSummary,
}

/// Places orders for the cart in a [`CartStore`].
#[derive(Clone)]
pub struct Checkout {
    cart: CartStore,
    gateway: Arc<dyn OrderGateway>,
    pricing: PricingPolicy,
}

impl Checkout {
    /// Create a checkout for `cart` submitting through `gateway`.
    #[must_use]
    pub fn new(cart: CartStore, gateway: Arc<dyn OrderGateway>, pricing: PricingPolicy) -> Self {
        Self {
            cart,
            gateway,
            pricing,
        }
    }

    /// Totals for the cart as it stands now.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary::compute(&self.cart.items(), &self.pricing)
    }

    /// Submit the current cart as an order.
    ///
    /// Checks run in the order a buyer would meet them: sign-in, then a
    /// non-empty cart, then the shipping form. On success the cart is cleared;
    /// on any error it is left as it was.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] describing the first failed check, or the
    /// gateway failure.
    #[instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<OrderReceipt, CheckoutError> {
        let user_id = request.user_id.ok_or(CheckoutError::LoginRequired)?;

        let items = self.cart.items();
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        request.shipping_info.validate()?;

        let order = OrderRequest::new(
            user_id,
            items.to_vec(),
            request.shipping_info,
            request.payment_method,
            &self.pricing,
        );
        let summary = OrderSummary::compute(&order.items, &self.pricing);

        let confirmation = match self.gateway.submit(&order).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                warn!(reference = %order.reference, error = %e, "Order submission failed");
                return Err(e.into());
            }
        };

        self.cart.clear();
        info!(
            reference = %order.reference,
            order_id = %confirmation.order_id,
            total = %summary.total,
            "Order placed"
        );

        Ok(OrderReceipt {
            reference: order.reference,
            confirmation,
            summary,
        })
    }
}
