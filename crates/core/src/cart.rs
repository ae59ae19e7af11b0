//! Cart line items and the cart state machine.
//!
//! [`CartState`] owns an insertion-ordered list of [`CartLineItem`]s and keeps
//! two invariants at all times:
//!
//! - at most one line item per [`ProductId`]
//! - every line item has a quantity of at least one
//!
//! All transitions are synchronous and pure. Durability and observation are
//! the caller's concern; each command returns a [`CartEvent`] describing what
//! happened so the caller can log it and persist the resulting list.
//!
//! # Price snapshot
//!
//! A line item keeps the unit price captured when the product was first added.
//! Adding the same product again only increments the quantity; the newly
//! supplied price and metadata are discarded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::product::{CatalogObject, ID_KEYS, PRICE_KEYS, QUANTITY_KEYS};
use crate::types::{
    ItemMetadata, ProductError, ProductId, ProductRef, Quantity, QuantityError, check_price,
};

/// Storage key under which the cart's line items are persisted.
pub const CART_STORAGE_KEY: &str = "cart";

/// Errors produced by cart validation.
#[derive(Debug, Error)]
pub enum CartError {
    /// The persisted blob is not a valid list of line items.
    #[error("malformed cart data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Two persisted line items share a product ID.
    #[error("duplicate line item for product {0}")]
    DuplicateProduct(ProductId),

    /// A command argument was out of range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),
}

/// One row in the cart.
///
/// Persisted items are read with the same field precedence as [`ProductRef`],
/// so blobs written by older app builds (`_id`/`id`, `price`) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    try_from = "serde_json::Map<String, serde_json::Value>"
)]
pub struct CartLineItem {
    /// Referenced product.
    pub product_id: ProductId,
    /// Price captured when the product was first added.
    pub unit_price: Decimal,
    /// Number of units; never zero.
    pub quantity: Quantity,
    /// Display metadata carried verbatim.
    #[serde(flatten)]
    pub metadata: ItemMetadata,
}

impl TryFrom<Map<String, Value>> for CartLineItem {
    type Error = ProductError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut fields = CatalogObject::new(fields);
        let product_id = fields.require(ID_KEYS)?;
        let unit_price = check_price(fields.require(PRICE_KEYS)?)?;
        let quantity = fields.require(QUANTITY_KEYS)?;
        Ok(Self {
            product_id,
            unit_price,
            quantity,
            metadata: fields.into_metadata()?,
        })
    }
}

impl CartLineItem {
    /// Start a new line item for a product with a quantity of one.
    #[must_use]
    pub fn from_product(product: ProductRef) -> Self {
        Self {
            product_id: product.product_id,
            unit_price: product.unit_price,
            quantity: Quantity::ONE,
            metadata: product.metadata.without_reserved_keys(),
        }
    }

    /// `unit_price × quantity`, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.get())
    }
}

/// What a cart command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    /// State was replaced from persisted data.
    Hydrated {
        /// Number of line items loaded.
        lines: usize,
    },
    /// A new line item was appended.
    Added,
    /// An existing line item's quantity was incremented.
    Incremented {
        /// Quantity after the increment.
        quantity: Quantity,
    },
    /// A line item's quantity was replaced.
    QuantitySet {
        /// The new quantity.
        quantity: Quantity,
    },
    /// A line item was removed.
    Removed,
    /// All line items were removed.
    Cleared,
    /// The command matched nothing; state is unchanged.
    Unchanged,
}

impl CartEvent {
    /// Whether the command modified the line items.
    #[must_use]
    pub const fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// The cart's line items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    items: Vec<CartLineItem>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from persisted line items, checking the uniqueness invariant.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::DuplicateProduct`] if two items share a product ID.
    pub fn from_items(items: Vec<CartLineItem>) -> Result<Self, CartError> {
        for (index, item) in items.iter().enumerate() {
            if items
                .iter()
                .skip(index + 1)
                .any(|other| other.product_id == item.product_id)
            {
                return Err(CartError::DuplicateProduct(item.product_id.clone()));
            }
        }
        Ok(Self { items })
    }

    /// Parse a persisted JSON blob into line items.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Malformed`] if the blob is not a JSON array of line
    /// items (including any item with a zero quantity), and
    /// [`CartError::DuplicateProduct`] if the list breaks uniqueness.
    pub fn parse_persisted(blob: &str) -> Result<Vec<CartLineItem>, CartError> {
        let items: Vec<CartLineItem> = serde_json::from_str(blob)?;
        Ok(Self::from_items(items)?.items)
    }

    /// Encode line items for persistence.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; line items always serialize in practice.
    pub fn encode(items: &[CartLineItem]) -> Result<String, serde_json::Error> {
        serde_json::to_string(items)
    }

    /// Replace the line items with persisted data.
    ///
    /// `None` leaves the cart empty. Invalid data (duplicate product IDs) is
    /// rejected and also leaves the cart empty, so calling this twice with the
    /// same input always yields the same state.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::DuplicateProduct`] when the input was discarded.
    pub fn hydrate(&mut self, persisted: Option<Vec<CartLineItem>>) -> Result<CartEvent, CartError> {
        self.items.clear();
        let Some(items) = persisted else {
            return Ok(CartEvent::Hydrated { lines: 0 });
        };
        let state = Self::from_items(items)?;
        *self = state;
        Ok(CartEvent::Hydrated {
            lines: self.items.len(),
        })
    }

    /// Add one unit of a product.
    ///
    /// Appends a new line with quantity one, or increments the existing line
    /// for the same product while keeping its original price and metadata.
    pub fn add_item(&mut self, product: ProductRef) -> CartEvent {
        if let Some(item) = self.find_mut(&product.product_id) {
            item.quantity = item.quantity.increment();
            return CartEvent::Incremented {
                quantity: item.quantity,
            };
        }
        self.items.push(CartLineItem::from_product(product));
        CartEvent::Added
    }

    /// Remove a product's line item. Absent IDs are a no-op.
    pub fn remove_item(&mut self, product_id: &ProductId) -> CartEvent {
        let before = self.items.len();
        self.items.retain(|item| &item.product_id != product_id);
        if self.items.len() == before {
            CartEvent::Unchanged
        } else {
            CartEvent::Removed
        }
    }

    /// Set a line item's quantity.
    ///
    /// A quantity of zero or less removes the line. A positive quantity for a
    /// product that is not in the cart is a no-op; only [`Self::add_item`]
    /// creates lines.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for quantities above `u32::MAX`;
    /// the cart is unchanged.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartEvent, CartError> {
        if quantity <= 0 {
            return Ok(self.remove_item(product_id));
        }
        let quantity = Quantity::try_from(quantity)?;
        Ok(self.find_mut(product_id).map_or(CartEvent::Unchanged, |item| {
            item.quantity = quantity;
            CartEvent::QuantitySet { quantity }
        }))
    }

    /// Remove every line item.
    pub fn clear(&mut self) -> CartEvent {
        self.items.clear();
        CartEvent::Cleared
    }

    /// The line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line item for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Sum of `unit_price × quantity` over all lines. Zero when empty.
    #[must_use]
    pub fn total(&self) -> Decimal {
        total_of(&self.items)
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count_of(&self.items)
    }

    fn find_mut(&mut self, product_id: &ProductId) -> Option<&mut CartLineItem> {
        self.items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
    }
}

/// Sum of line totals for a list of items.
#[must_use]
pub fn total_of(items: &[CartLineItem]) -> Decimal {
    items.iter().map(CartLineItem::line_total).sum()
}

/// Sum of quantities for a list of items.
#[must_use]
pub fn item_count_of(items: &[CartLineItem]) -> u64 {
    items
        .iter()
        .map(|item| u64::from(item.quantity.get()))
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: &str, price: i64) -> ProductRef {
        ProductRef::new(id, Decimal::from(price))
    }

    fn quantities(cart: &CartState) -> Vec<(&str, u32)> {
        cart.items()
            .iter()
            .map(|item| (item.product_id.as_str(), item.quantity.get()))
            .collect()
    }

    #[test]
    fn test_add_new_product_appends_with_quantity_one() {
        let mut cart = CartState::new();
        assert_eq!(cart.add_item(product("p1", 10)), CartEvent::Added);
        assert_eq!(quantities(&cart), vec![("p1", 1)]);
    }

    #[test]
    fn test_repeat_add_keeps_first_price_and_metadata() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10).with_metadata(ItemMetadata::named("Original")));
        let event = cart.add_item(product("p1", 999).with_metadata(ItemMetadata::named("New")));

        assert_eq!(
            event,
            CartEvent::Incremented {
                quantity: Quantity::new(2).unwrap()
            }
        );
        let item = cart.get(&ProductId::new("p1")).unwrap();
        assert_eq!(item.unit_price, Decimal::from(10));
        assert_eq!(item.metadata.name.as_deref(), Some("Original"));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut cart = CartState::new();
        cart.add_item(product("b", 1));
        cart.add_item(product("a", 1));
        cart.add_item(product("b", 1));
        assert_eq!(quantities(&cart), vec![("b", 2), ("a", 1)]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10));
        let before = cart.clone();
        assert_eq!(cart.remove_item(&ProductId::new("nope")), CartEvent::Unchanged);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_quantity_non_positive_removes() {
        for quantity in [0, -5] {
            let mut cart = CartState::new();
            cart.add_item(product("p1", 10));
            cart.add_item(product("p2", 5));

            let mut expected = cart.clone();
            expected.remove_item(&ProductId::new("p1"));

            let event = cart.update_quantity(&ProductId::new("p1"), quantity).unwrap();
            assert_eq!(event, CartEvent::Removed);
            assert_eq!(cart, expected);
        }
    }

    #[test]
    fn test_update_quantity_absent_is_noop() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10));
        let before = cart.clone();
        let event = cart.update_quantity(&ProductId::new("p9"), 5).unwrap();
        assert_eq!(event, CartEvent::Unchanged);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_quantity_too_large_rejected() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10));
        let before = cart.clone();
        let result = cart.update_quantity(&ProductId::new("p1"), i64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(CartError::InvalidQuantity(_))));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_totals() {
        let mut cart = CartState::new();
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);

        cart.add_item(ProductRef::new("p1", Decimal::new(1999, 2)));
        cart.add_item(ProductRef::new("p1", Decimal::new(1999, 2)));
        cart.add_item(ProductRef::new("p2", Decimal::new(5, 1)));

        assert_eq!(cart.total(), Decimal::new(4048, 2));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_total_is_not_rounded() {
        let mut cart = CartState::new();
        cart.add_item(ProductRef::new("p1", Decimal::new(3333, 3)));
        cart.update_quantity(&ProductId::new("p1"), 3).unwrap();
        assert_eq!(cart.total(), Decimal::new(9999, 3));
    }

    #[test]
    fn test_hydrate_is_idempotent() {
        let mut seed = CartState::new();
        seed.add_item(product("p1", 10));
        seed.add_item(product("p2", 5));
        let persisted = seed.items().to_vec();

        let mut once = CartState::new();
        once.hydrate(Some(persisted.clone())).unwrap();

        let mut twice = CartState::new();
        twice.hydrate(Some(persisted.clone())).unwrap();
        twice.hydrate(Some(persisted)).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, seed);
    }

    #[test]
    fn test_hydrate_none_empties() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10));
        assert_eq!(cart.hydrate(None).unwrap(), CartEvent::Hydrated { lines: 0 });
        assert!(cart.is_empty());
    }

    #[test]
    fn test_hydrate_duplicates_rejected_and_empty() {
        let item = CartLineItem::from_product(product("p1", 10));
        let mut cart = CartState::new();
        let result = cart.hydrate(Some(vec![item.clone(), item]));
        assert!(matches!(result, Err(CartError::DuplicateProduct(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_parse_persisted_shapes() {
        assert!(matches!(
            CartState::parse_persisted(r#"{"not": "an array"}"#),
            Err(CartError::Malformed(_))
        ));
        assert!(matches!(
            CartState::parse_persisted(r#"[{"productId": "p1", "unitPrice": "1"}]"#),
            Err(CartError::Malformed(_))
        ));
        assert!(matches!(
            CartState::parse_persisted(r#"[{"productId": "p1", "unitPrice": "1", "quantity": 0}]"#),
            Err(CartError::Malformed(_))
        ));

        let items = CartState::parse_persisted(
            r#"[{"id": 1, "price": 99.99, "quantity": 2, "name": "Wireless Headphones"}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity.get(), 2);
        assert_eq!(items[0].line_total(), Decimal::new(19998, 2));
    }

    #[test]
    fn test_encode_then_parse_keeps_items() {
        let mut cart = CartState::new();
        cart.add_item(product("p1", 10).with_metadata(ItemMetadata::named("Shoes")));
        cart.add_item(product("p1", 10));

        let blob = CartState::encode(cart.items()).unwrap();
        let items = CartState::parse_persisted(&blob).unwrap();
        assert_eq!(items, cart.items());
    }

    #[test]
    fn test_catalog_quantity_survives_persistence() {
        let product: ProductRef = serde_json::from_str(
            r#"{"id": 1, "price": 99.99, "name": "Headphones", "quantity": 3}"#,
        )
        .unwrap();
        let mut cart = CartState::new();
        cart.add_item(product);

        let blob = CartState::encode(cart.items()).unwrap();
        assert_eq!(blob.matches("\"quantity\"").count(), 1, "{blob}");
        let items = CartState::parse_persisted(&blob).unwrap();
        assert_eq!(items, cart.items());
        assert_eq!(items[0].quantity, Quantity::ONE);
    }

    #[test]
    fn test_parse_persisted_with_both_id_keys() {
        let items = CartState::parse_persisted(
            r#"[{"_id": "64f1", "id": "64f1", "price": 5, "quantity": 2, "rating": 4}]"#,
        )
        .unwrap();
        assert_eq!(items[0].product_id.as_str(), "64f1");
        assert_eq!(items[0].metadata.extra.len(), 1);

        let blob = CartState::encode(&items).unwrap();
        assert_eq!(CartState::parse_persisted(&blob).unwrap(), items);
    }

    #[test]
    fn test_parse_persisted_rejects_negative_price() {
        assert!(matches!(
            CartState::parse_persisted(r#"[{"productId": "p1", "unitPrice": "-1", "quantity": 1}]"#),
            Err(CartError::Malformed(_))
        ));
    }
}
