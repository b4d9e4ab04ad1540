//! Identifier types for cart entities.
//!
//! [`ProductId`] is the catalog's opaque identifier. [`LineKey`] is derived
//! from a product and its selected variant and is what the cart is keyed by.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the encoded segments of a [`LineKey`].
const LINE_KEY_SEPARATOR: char = ':';

/// Opaque identifier of a catalog product.
///
/// The storefront never interprets the value; it is whatever the catalog
/// backend hands out (an `ObjectId`, a slug, a numeric string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new product ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the ID is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stable identifier of one cart line.
///
/// A line key is the product ID, size and color, each percent-encoded and
/// joined with `:`. An absent selector (or an empty one) becomes an empty
/// segment, so `p1` with size `M` and no color is `p1:M:`.
///
/// Encoding keeps keys collision-free when selector values contain the
/// separator, and makes them usable as a single URL path segment.
///
/// # Examples
///
/// ```
/// use storefront_cart_core::{LineKey, ProductId};
///
/// let key = LineKey::derive(&ProductId::from("p1"), Some("M"), None);
/// assert_eq!(key.as_str(), "p1:M:");
///
/// // Same product, different size: different line.
/// let other = LineKey::derive(&ProductId::from("p1"), Some("L"), None);
/// assert_ne!(key, other);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineKey(String);

impl LineKey {
    /// Derive the key for a product + variant combination.
    #[must_use]
    pub fn derive(product_id: &ProductId, size: Option<&str>, color: Option<&str>) -> Self {
        let mut key = String::with_capacity(product_id.as_str().len() + 8);
        key.push_str(&urlencoding::encode(product_id.as_str()));
        key.push(LINE_KEY_SEPARATOR);
        if let Some(size) = size {
            key.push_str(&urlencoding::encode(size));
        }
        key.push(LINE_KEY_SEPARATOR);
        if let Some(color) = color {
            key.push_str(&urlencoding::encode(color));
        }
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LineKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ProductId {
        ProductId::from(s)
    }

    #[test]
    fn test_line_key_is_deterministic() {
        let a = LineKey::derive(&pid("p1"), Some("M"), Some("red"));
        let b = LineKey::derive(&pid("p1"), Some("M"), Some("red"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "p1:M:red");
    }

    #[test]
    fn test_line_key_differs_by_variant() {
        let m = LineKey::derive(&pid("p1"), Some("M"), None);
        let l = LineKey::derive(&pid("p1"), Some("L"), None);
        let red = LineKey::derive(&pid("p1"), Some("M"), Some("red"));
        assert_ne!(m, l);
        assert_ne!(m, red);
    }

    #[test]
    fn test_line_key_size_and_color_are_positional() {
        // "M" as a size must not collide with "M" as a color.
        let size = LineKey::derive(&pid("p1"), Some("M"), None);
        let color = LineKey::derive(&pid("p1"), None, Some("M"));
        assert_ne!(size, color);
    }

    #[test]
    fn test_line_key_escapes_separator() {
        let tricky = LineKey::derive(&pid("p1:M"), None, None);
        let plain = LineKey::derive(&pid("p1"), Some("M"), None);
        assert_ne!(tricky, plain);
        assert_eq!(tricky.as_str(), "p1%3AM::");
    }

    #[test]
    fn test_line_key_encodes_path_unsafe_characters() {
        let key = LineKey::derive(&pid("shirt/42"), Some("X L"), Some("navy?"));
        assert!(!key.as_str().contains('/'));
        assert!(!key.as_str().contains(' '));
        assert!(!key.as_str().contains('?'));
    }

    #[test]
    fn test_product_id_serde_transparent() {
        let id = pid("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let parsed: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_display() {
        let key = LineKey::derive(&pid("p1"), None, None);
        assert_eq!(format!("{key}"), "p1::");
        assert_eq!(format!("{}", pid("p1")), "p1");
    }
}
