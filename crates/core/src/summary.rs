//! Order summary shown at checkout.
//!
//! The summary extends the cart total with a flat shipping charge and a
//! percentage tax. Like the cart total, nothing here is rounded; the
//! `*_display` helpers round to cents for presentation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartLineItem, item_count_of, total_of};
use crate::types::{CurrencyCode, Price};

/// Shipping and tax rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Flat shipping charge per order.
    pub shipping: Decimal,
    /// Tax rate applied to the subtotal (e.g., `0.08` for 8%).
    pub tax_rate: Decimal,
    /// Currency every amount is expressed in.
    pub currency: CurrencyCode,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping: Decimal::new(500, 2),
            tax_rate: Decimal::new(8, 2),
            currency: CurrencyCode::USD,
        }
    }
}

/// Totals for an order built from a cart snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Sum of line totals.
    pub subtotal: Decimal,
    /// Shipping charge.
    pub shipping: Decimal,
    /// Tax on the subtotal.
    pub tax: Decimal,
    /// `subtotal + shipping + tax`.
    pub total: Decimal,
    /// Number of units across all lines.
    pub item_count: u64,
    /// Currency of every amount.
    pub currency: CurrencyCode,
}

impl OrderSummary {
    /// Compute the summary for a list of line items.
    #[must_use]
    pub fn compute(items: &[CartLineItem], policy: &PricingPolicy) -> Self {
        let subtotal = total_of(items);
        let tax = subtotal * policy.tax_rate;
        Self {
            subtotal,
            shipping: policy.shipping,
            tax,
            total: subtotal + policy.shipping + tax,
            item_count: item_count_of(items),
            currency: policy.currency,
        }
    }

    /// Subtotal formatted for display.
    #[must_use]
    pub fn subtotal_display(&self) -> String {
        Price::new(self.subtotal, self.currency).display()
    }

    /// Shipping formatted for display.
    #[must_use]
    pub fn shipping_display(&self) -> String {
        Price::new(self.shipping, self.currency).display()
    }

    /// Tax formatted for display.
    #[must_use]
    pub fn tax_display(&self) -> String {
        Price::new(self.tax, self.currency).display()
    }

    /// Grand total formatted for display.
    #[must_use]
    pub fn total_display(&self) -> String {
        Price::new(self.total, self.currency).display()
    }
}
