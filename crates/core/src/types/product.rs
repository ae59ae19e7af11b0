//! Product data as it enters the cart.
//!
//! The cart interprets only the product ID and unit price. Everything else the
//! catalog sends (name, image, category, ratings...) rides along in
//! [`ItemMetadata`] for display.
//!
//! Catalog payloads are read field by field rather than through serde aliases:
//! an object may carry `productId`, `_id` and `id` at once, and the first
//! non-null one in that order wins. Keys the cart interprets are never kept in
//! [`ItemMetadata::extra`], so a line item always serializes each field once.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::id::ProductId;

/// Accepted product ID keys, highest precedence first.
pub(crate) const ID_KEYS: &[&str] = &["productId", "_id", "id"];
/// Accepted unit price keys, highest precedence first.
pub(crate) const PRICE_KEYS: &[&str] = &["unitPrice", "price"];
/// Line item quantity key.
pub(crate) const QUANTITY_KEYS: &[&str] = &["quantity"];

/// Errors from reading catalog-shaped product data.
#[derive(Debug, Error)]
pub enum ProductError {
    /// A required field is absent or null.
    #[error("missing field `{0}`")]
    Missing(&'static str),

    /// A field has the wrong shape.
    #[error("invalid field `{field}`: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Unit prices are never negative.
    #[error("unit price must not be negative, got {0}")]
    NegativePrice(Decimal),
}

/// Reject negative unit prices.
///
/// # Errors
///
/// Returns [`ProductError::NegativePrice`] for amounts below zero.
pub fn check_price(unit_price: Decimal) -> Result<Decimal, ProductError> {
    if unit_price < Decimal::ZERO {
        return Err(ProductError::NegativePrice(unit_price));
    }
    Ok(unit_price)
}

/// A catalog JSON object being taken apart.
pub(crate) struct CatalogObject(Map<String, Value>);

impl CatalogObject {
    pub(crate) const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Remove every key in `keys` and parse the first non-null value.
    pub(crate) fn take<T: DeserializeOwned>(
        &mut self,
        keys: &[&'static str],
    ) -> Result<Option<T>, ProductError> {
        let mut found = None;
        for &key in keys {
            match self.0.remove(key) {
                None | Some(Value::Null) => {}
                Some(value) if found.is_none() => found = Some((key, value)),
                Some(_) => {}
            }
        }
        found
            .map(|(field, value)| {
                serde_json::from_value(value)
                    .map_err(|source| ProductError::InvalidField { field, source })
            })
            .transpose()
    }

    /// Like [`Self::take`], but the field must be present.
    pub(crate) fn require<T: DeserializeOwned>(
        &mut self,
        keys: &[&'static str],
    ) -> Result<T, ProductError> {
        let field = keys.first().copied().unwrap_or("?");
        self.take(keys)?.ok_or(ProductError::Missing(field))
    }

    /// Everything left over, as display metadata.
    pub(crate) fn into_metadata(mut self) -> Result<ItemMetadata, ProductError> {
        for key in ID_KEYS.iter().chain(PRICE_KEYS).chain(QUANTITY_KEYS) {
            self.0.remove(*key);
        }
        serde_json::from_value(Value::Object(self.0)).map_err(|source| {
            ProductError::InvalidField {
                field: "metadata",
                source,
            }
        })
    }
}

/// Display metadata carried by a line item.
///
/// The well-known display fields are typed; any other catalog fields are kept
/// verbatim in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Product name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Product image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Catalog category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Product description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unrecognized catalog fields. Never holds ID, price or quantity keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemMetadata {
    /// Metadata with only a display name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Drop extra keys that would collide with the line item's own fields.
    #[must_use]
    pub fn without_reserved_keys(mut self) -> Self {
        self.extra.retain(|key, _| {
            !ID_KEYS
                .iter()
                .chain(PRICE_KEYS)
                .chain(QUANTITY_KEYS)
                .any(|reserved| reserved == key)
        });
        self
    }
}

/// A product reference passed to the cart's add command.
///
/// Accepts catalog-shaped JSON: the ID may arrive as `productId`, `_id` or
/// `id`, and the price as `unitPrice` or `price`. A `quantity` sent along with
/// the product is ignored; adding always contributes one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    try_from = "serde_json::Map<String, serde_json::Value>"
)]
pub struct ProductRef {
    /// Product identifier.
    pub product_id: ProductId,
    /// Unit price at the time of adding.
    pub unit_price: Decimal,
    /// Display metadata.
    #[serde(flatten)]
    pub metadata: ItemMetadata,
}

impl TryFrom<Map<String, Value>> for ProductRef {
    type Error = ProductError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut fields = CatalogObject::new(fields);
        let product_id = fields.require(ID_KEYS)?;
        let unit_price = check_price(fields.require(PRICE_KEYS)?)?;
        Ok(Self {
            product_id,
            unit_price,
            metadata: fields.into_metadata()?,
        })
    }
}

impl ProductRef {
    /// Create a product reference without metadata.
    ///
    /// The price is taken as given; use [`Self::try_new`] for untrusted input.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            unit_price,
            metadata: ItemMetadata::default(),
        }
    }

    /// Create a product reference, rejecting negative prices.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::NegativePrice`] if `unit_price` is below zero.
    pub fn try_new(
        product_id: impl Into<ProductId>,
        unit_price: Decimal,
    ) -> Result<Self, ProductError> {
        Ok(Self::new(product_id, check_price(unit_price)?))
    }

    /// Attach display metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = metadata.without_reserved_keys();
        self
    }
}
