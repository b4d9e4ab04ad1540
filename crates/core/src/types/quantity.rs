//! Line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::types::item::CartItemError;

/// A strictly positive line quantity.
///
/// A cart never holds a zero or negative quantity: reducing a line to zero
/// removes it. Raw quantities coming from a UI are `i64` so that negative
/// input survives long enough to be rejected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartItemError::InvalidQuantity`] if `raw` is zero, negative,
    /// or larger than `u32::MAX`.
    pub fn new(raw: i64) -> Result<Self, CartItemError> {
        u32::try_from(raw)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(CartItemError::InvalidQuantity(raw))
    }

    /// Returns the quantity as a `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Add another quantity, or `None` past `u32::MAX`.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0.get()) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }
}

impl TryFrom<i64> for Quantity {
    type Error = CartItemError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
