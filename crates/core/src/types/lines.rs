//! Ordered, key-unique line collections and their aggregates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::LineKey;
use crate::types::item::{CartItemError, CartLineItem};
use crate::types::quantity::Quantity;

/// Cart lines in insertion order, at most one per [`LineKey`].
///
/// Every constructor and mutator preserves key uniqueness: adding a line
/// whose key already exists increments that line instead of appending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CartLines(Vec<CartLineItem>);

impl CartLines {
    /// An empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a collection from lines that must already be key-unique.
    ///
    /// Used at trust boundaries (server responses, the guest store) where a
    /// repeated key means the document is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::DuplicateLine`] for the first repeated key,
    /// or [`CartItemError::ValueOverflow`] if the lines cannot be totalled.
    pub fn from_unique(items: Vec<CartLineItem>) -> Result<Self, CartItemError> {
        for (i, item) in items.iter().enumerate() {
            if items
                .iter()
                .skip(i + 1)
                .any(|other| other.line_key() == item.line_key())
            {
                return Err(CartItemError::DuplicateLine(item.line_key().clone()));
            }
        }
        checked_total_value(&items)?;
        Ok(Self(items))
    }

    /// Add a line, merging into an existing line with the same key.
    ///
    /// The existing line keeps its position and its other fields; only the
    /// quantity grows. On error the collection is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::InvalidQuantity`] if the merged quantity
    /// exceeds `u32::MAX`, or [`CartItemError::ValueOverflow`] if the cart
    /// value would no longer be representable.
    pub fn merge(&mut self, item: CartLineItem) -> Result<(), CartItemError> {
        let mut next = self.0.clone();
        match next
            .iter_mut()
            .find(|line| line.line_key() == item.line_key())
        {
            Some(existing) => {
                let quantity = existing
                    .quantity()
                    .checked_add(item.quantity())
                    .ok_or_else(|| {
                        CartItemError::InvalidQuantity(
                            i64::from(existing.quantity().get()) + i64::from(item.quantity().get()),
                        )
                    })?;
                *existing = existing.clone().with_quantity(quantity)?;
            }
            None => next.push(item),
        }
        checked_total_value(&next)?;
        self.0 = next;
        Ok(())
    }

    /// Remove the line with `key`. Returns `true` if a line was removed.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.0.len();
        self.0.retain(|line| line.line_key() != key);
        self.0.len() != before
    }

    /// Replace the quantity of the line with `key`. Returns `true` if the
    /// line exists.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::ValueOverflow`] if the line or cart value
    /// would no longer be representable. The collection is then unchanged.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: Quantity) -> Result<bool, CartItemError> {
        let Some(index) = self.0.iter().position(|line| line.line_key() == key) else {
            return Ok(false);
        };
        let mut next = self.0.clone();
        next[index] = next[index].clone().with_quantity(quantity)?;
        checked_total_value(&next)?;
        self.0 = next;
        Ok(true)
    }

    /// Look up a line by key.
    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&CartLineItem> {
        self.0.iter().find(|line| line.line_key() == key)
    }

    /// Iterate over lines in order.
    pub fn iter(&self) -> std::slice::Iter<'_, CartLineItem> {
        self.0.iter()
    }

    /// The lines as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[CartLineItem] {
        &self.0
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the collection into its lines.
    #[must_use]
    pub fn into_vec(self) -> Vec<CartLineItem> {
        self.0
    }

    /// Recompute the aggregates from scratch.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::compute(&self.0)
    }

    /// Compare two collections as sets of lines, ignoring order.
    #[must_use]
    pub fn eq_ignoring_order(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|line| other.get(line.line_key()) == Some(line))
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartLineItem;
    type IntoIter = std::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for CartLines {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<CartLineItem>::deserialize(deserializer)?;
        Self::from_unique(items).map_err(serde::de::Error::custom)
    }
}

fn checked_total_value(items: &[CartLineItem]) -> Result<Decimal, CartItemError> {
    items.iter().try_fold(Decimal::ZERO, |sum, line| {
        sum.checked_add(line.line_total())
            .ok_or(CartItemError::ValueOverflow)
    })
}

/// Aggregates derived from a line collection.
///
/// Always produced by [`CartTotals::compute`]; never adjusted in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of all line quantities.
    pub total_quantity: u64,
    /// Number of distinct lines.
    pub unique_line_count: usize,
    /// Sum of `unit_price × quantity` over all lines.
    pub total_value: Decimal,
}

impl CartTotals {
    /// Compute the aggregates for `items`.
    ///
    /// [`CartLines`] keeps its total value representable. For other slices
    /// the value saturates at `Decimal::MAX`.
    #[must_use]
    pub fn compute(items: &[CartLineItem]) -> Self {
        Self {
            total_quantity: items
                .iter()
                .map(|line| u64::from(line.quantity().get()))
                .sum(),
            unique_line_count: items.len(),
            total_value: items
                .iter()
                .fold(Decimal::ZERO, |sum, line| sum.saturating_add(line.line_total())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::item::NewCartItem;

    fn line(product: &str, size: Option<&str>, price: &str, qty: i64) -> CartLineItem {
        let mut item = NewCartItem::new(product, product.to_uppercase(), price.parse().unwrap(), qty);
        item.size = size.map(str::to_owned);
        item.validate().unwrap()
    }

    #[test]
    fn test_merge_same_key_adds_quantities() {
        let mut lines = CartLines::new();
        lines.merge(line("p1", Some("M"), "10", 2)).unwrap();
        lines.merge(line("p1", Some("M"), "10", 1)).unwrap();

        assert_eq!(lines.len(), 1);
        let totals = lines.totals();
        assert_eq!(totals.unique_line_count, 1);
        assert_eq!(totals.total_quantity, 3);
    }

    #[test]
    fn test_merge_different_variant_appends() {
        let mut lines = CartLines::new();
        lines.merge(line("p1", Some("M"), "10", 1)).unwrap();
        lines.merge(line("p1", Some("L"), "10", 1)).unwrap();

        assert_eq!(lines.totals().unique_line_count, 2);
    }

    #[test]
    fn test_merge_keeps_position() {
        let mut lines = CartLines::new();
        lines.merge(line("a", None, "1", 1)).unwrap();
        lines.merge(line("b", None, "1", 1)).unwrap();
        lines.merge(line("a", None, "1", 4)).unwrap();

        let order: Vec<_> = lines.iter().map(|l| l.product_id().as_str()).collect();
        assert_eq!(order, ["a", "b"]);
        assert_eq!(lines.as_slice()[0].quantity().get(), 5);
    }

    #[test]
    fn test_remove() {
        let mut lines = CartLines::new();
        let tee = line("p1", None, "10", 2);
        let key = tee.line_key().clone();
        lines.merge(tee).unwrap();
        lines.merge(line("p2", None, "5", 1)).unwrap();

        assert!(lines.remove(&key));
        assert!(!lines.remove(&key));
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_set_quantity() {
        let mut lines = CartLines::new();
        let tee = line("p1", None, "10", 2);
        let key = tee.line_key().clone();
        lines.merge(tee).unwrap();

        assert!(lines.set_quantity(&key, Quantity::new(7).unwrap()).unwrap());
        assert_eq!(lines.get(&key).unwrap().quantity().get(), 7);

        let missing = line("zzz", None, "1", 1).line_key().clone();
        assert!(!lines.set_quantity(&missing, Quantity::ONE).unwrap());
    }

    #[test]
    fn test_totals_match_definitions() {
        let mut lines = CartLines::new();
        lines.merge(line("p1", Some("M"), "19.99", 2)).unwrap();
        lines.merge(line("p2", None, "5.00", 3)).unwrap();
        lines.merge(line("p1", Some("M"), "19.99", 1)).unwrap();

        let totals = lines.totals();
        assert_eq!(totals.total_quantity, 6);
        assert_eq!(totals.unique_line_count, 2);
        assert_eq!(totals.total_value, "74.97".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_merge_past_u32_max_is_rejected() {
        let mut lines = CartLines::new();
        lines.merge(line("p1", None, "1", i64::from(u32::MAX))).unwrap();
        let before = lines.clone();

        let err = lines.merge(line("p1", None, "1", 1)).unwrap_err();

        assert_eq!(err, CartItemError::InvalidQuantity(i64::from(u32::MAX) + 1));
        assert_eq!(lines, before);
    }

    #[test]
    fn test_value_overflow_leaves_lines_unchanged() {
        let mut lines = CartLines::new();
        let big = line("p1", None, "79228162514264337593543950335", 1);
        let key = big.line_key().clone();
        lines.merge(big).unwrap();
        let before = lines.clone();

        assert_eq!(
            lines.merge(line("p2", None, "1", 1)).unwrap_err(),
            CartItemError::ValueOverflow
        );
        assert_eq!(
            lines.set_quantity(&key, Quantity::new(2).unwrap()).unwrap_err(),
            CartItemError::ValueOverflow
        );
        assert_eq!(lines, before);
        assert_eq!(lines.totals().total_value, Decimal::MAX);
    }

    #[test]
    fn test_totals_empty() {
        assert_eq!(CartLines::new().totals(), CartTotals::default());
    }

    #[test]
    fn test_from_unique_rejects_duplicates() {
        let err = CartLines::from_unique(vec![
            line("p1", None, "1", 1),
            line("p1", None, "1", 2),
        ])
        .unwrap_err();
        assert!(matches!(err, CartItemError::DuplicateLine(_)));
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let json = r#"[
            {"productId":"p1","unitPrice":"1","quantity":1},
            {"productId":"p1","unitPrice":"1","quantity":1}
        ]"#;
        assert!(serde_json::from_str::<CartLines>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_unrepresentable_total() {
        let json = r#"[
            {"productId":"p1","unitPrice":"79228162514264337593543950335","quantity":1},
            {"productId":"p2","unitPrice":"79228162514264337593543950335","quantity":1}
        ]"#;
        assert!(serde_json::from_str::<CartLines>(json).is_err());

        let json = r#"[{"productId":"p1","unitPrice":"79228162514264337593543950335","quantity":2}]"#;
        assert!(serde_json::from_str::<CartLines>(json).is_err());
    }

    #[test]
    fn test_eq_ignoring_order() {
        let a = CartLines::from_unique(vec![line("a", None, "1", 1), line("b", None, "2", 2)])
            .unwrap();
        let b = CartLines::from_unique(vec![line("b", None, "2", 2), line("a", None, "1", 1)])
            .unwrap();
        assert_ne!(a, b);
        assert!(a.eq_ignoring_order(&b));

        let c = CartLines::from_unique(vec![line("a", None, "1", 3), line("b", None, "2", 2)])
            .unwrap();
        assert!(!a.eq_ignoring_order(&c));
    }
}
