//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::{LineKey, ProductId};
use crate::types::quantity::Quantity;

/// Errors that can occur when validating a cart line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartItemError {
    /// The product identifier is empty.
    #[error("product id cannot be empty")]
    EmptyProductId,
    /// The quantity is not a positive integer that fits in a `u32`.
    #[error("quantity must be a positive integer (got {0})")]
    InvalidQuantity(i64),
    /// The unit price is negative.
    #[error("unit price cannot be negative (got {0})")]
    NegativePrice(Decimal),
    /// Two lines in one collection share a line key.
    #[error("duplicate cart line {0}")]
    DuplicateLine(LineKey),
    /// A line or cart value does not fit in a `Decimal`.
    #[error("cart value out of range")]
    ValueOverflow,
}

/// A candidate cart line, as submitted by the UI.
///
/// Carries no line key; the key is derived when the candidate is validated
/// into a [`CartLineItem`]. The quantity is raw so that bad input can be
/// rejected instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    /// Catalog product identifier.
    pub product_id: ProductId,
    /// Product name shown in the cart.
    pub display_name: String,
    /// Price of a single unit.
    pub unit_price: Decimal,
    /// Image URL or media reference.
    #[serde(default)]
    pub image_ref: String,
    /// Number of units to add.
    pub quantity: i64,
    /// Selected size, if the product has sizes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Selected color, if the product has colors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewCartItem {
    /// Convenience constructor for a candidate with no variant selectors.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        display_name: impl Into<String>,
        unit_price: Decimal,
        quantity: i64,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            display_name: display_name.into(),
            unit_price,
            image_ref: String::new(),
            quantity,
            size: None,
            color: None,
        }
    }

    /// Set the size selector.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the color selector.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the image reference.
    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = image_ref.into();
        self
    }

    /// Validate the candidate and derive its line key.
    ///
    /// # Errors
    ///
    /// Returns an error if the product ID is empty, the quantity is not a
    /// positive integer, or the price is negative.
    pub fn validate(self) -> Result<CartLineItem, CartItemError> {
        let quantity = Quantity::new(self.quantity)?;
        CartLineItem::new(
            self.product_id,
            self.display_name,
            self.unit_price,
            self.image_ref,
            quantity,
            self.size,
            self.color,
        )
    }
}

/// A validated cart line.
///
/// The line key is derived from the product ID and variant selectors at
/// construction and those fields are read-only afterwards, so the key can
/// never disagree with them. A `lineKey` present in incoming JSON is ignored
/// and recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CartLineRecord")]
pub struct CartLineItem {
    line_key: LineKey,
    product_id: ProductId,
    display_name: String,
    unit_price: Decimal,
    image_ref: String,
    quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

impl CartLineItem {
    /// Build a line, deriving its key.
    ///
    /// Empty size or color strings are treated as "no selection".
    ///
    /// # Errors
    ///
    /// Returns an error if the product ID is empty, the price is negative,
    /// or `unit_price × quantity` is not representable.
    pub fn new(
        product_id: ProductId,
        display_name: String,
        unit_price: Decimal,
        image_ref: String,
        quantity: Quantity,
        size: Option<String>,
        color: Option<String>,
    ) -> Result<Self, CartItemError> {
        if product_id.is_empty() {
            return Err(CartItemError::EmptyProductId);
        }
        if unit_price.is_sign_negative() && !unit_price.is_zero() {
            return Err(CartItemError::NegativePrice(unit_price));
        }
        checked_line_total(unit_price, quantity)?;

        let size = size.filter(|s| !s.is_empty());
        let color = color.filter(|c| !c.is_empty());
        let line_key = LineKey::derive(&product_id, size.as_deref(), color.as_deref());

        Ok(Self {
            line_key,
            product_id,
            display_name,
            unit_price,
            image_ref,
            quantity,
            size,
            color,
        })
    }

    /// The line's derived key.
    #[must_use]
    pub const fn line_key(&self) -> &LineKey {
        &self.line_key
    }

    /// Catalog product identifier.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Product name shown in the cart.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Price of a single unit.
    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Image URL or media reference.
    #[must_use]
    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    /// Number of units on this line.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Selected size.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }

    /// Selected color.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// `unit_price × quantity`.
    ///
    /// Construction guarantees the product is representable.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.get())
    }

    /// Same line with a different quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::ValueOverflow`] if the new line total is not
    /// representable.
    pub fn with_quantity(mut self, quantity: Quantity) -> Result<Self, CartItemError> {
        checked_line_total(self.unit_price, quantity)?;
        self.quantity = quantity;
        Ok(self)
    }
}

fn checked_line_total(unit_price: Decimal, quantity: Quantity) -> Result<Decimal, CartItemError> {
    unit_price
        .checked_mul(Decimal::from(quantity.get()))
        .ok_or(CartItemError::ValueOverflow)
}

/// Wire shape of a line, before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLineRecord {
    product_id: ProductId,
    #[serde(default)]
    display_name: String,
    unit_price: Decimal,
    #[serde(default)]
    image_ref: String,
    quantity: i64,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

impl TryFrom<CartLineRecord> for CartLineItem {
    type Error = CartItemError;

    fn try_from(record: CartLineRecord) -> Result<Self, Self::Error> {
        NewCartItem {
            product_id: record.product_id,
            display_name: record.display_name,
            unit_price: record.unit_price,
            image_ref: record.image_ref,
            quantity: record.quantity,
            size: record.size,
            color: record.color,
        }
        .validate()
    }
}
