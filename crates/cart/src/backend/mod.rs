//! Cart backends.
//!
//! A backend is where the active session's cart lives. The manager selects
//! one when the session mode changes and calls every operation through the
//! [`CartBackend`] trait, so no operation branches on guest vs. authenticated.
//!
//! - [`LocalBackend`] - guest carts, persisted to the [`GuestCartStore`](crate::store::GuestCartStore)
//! - [`RemoteBackend`] - authenticated carts, owned by the remote cart API

mod local;
mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use storefront_cart_core::{CartLineItem, CartLines, LineKey, Quantity, SessionMode};

use crate::error::CartError;

/// A cart mutation, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    /// Add a line, merging with an existing line of the same key.
    Add(CartLineItem),
    /// Remove the line with this key.
    Remove(LineKey),
    /// Replace the quantity of the line with this key.
    SetQuantity(LineKey, Quantity),
    /// Remove every line.
    Clear,
}

impl CartOp {
    /// Short name for logs and breadcrumbs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::SetQuantity(_, _) => "set_quantity",
            Self::Clear => "clear",
        }
    }

    /// Key of the line the operation targets, if any.
    #[must_use]
    pub const fn line_key(&self) -> Option<&LineKey> {
        match self {
            Self::Add(line) => Some(line.line_key()),
            Self::Remove(key) | Self::SetQuantity(key, _) => Some(key),
            Self::Clear => None,
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The cart after the operation.
    pub lines: CartLines,
    /// Non-fatal problem encountered while applying (e.g., the guest store
    /// could not be written). The lines are still valid.
    pub warning: Option<CartError>,
}

impl Applied {
    /// A clean result.
    #[must_use]
    pub const fn ok(lines: CartLines) -> Self {
        Self {
            lines,
            warning: None,
        }
    }
}

/// Where a session's cart lives.
///
/// Implementations never mutate `current`; they return the complete new
/// cart, or an error with nothing applied.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// The session mode this backend serves.
    fn mode(&self) -> SessionMode;

    /// Read the cart from the backing store.
    async fn load(&self) -> Result<CartLines, CartError>;

    /// Apply one operation to the cart.
    async fn apply(&self, current: &CartLines, op: CartOp) -> Result<Applied, CartError>;
}
