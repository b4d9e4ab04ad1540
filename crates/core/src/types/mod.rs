//! Core types for the storefront cart.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod item;
pub mod lines;
pub mod quantity;
pub mod session;
pub mod state;

pub use id::{LineKey, ProductId};
pub use item::{CartItemError, CartLineItem, NewCartItem};
pub use lines::{CartLines, CartTotals};
pub use quantity::Quantity;
pub use session::SessionMode;
pub use state::CartState;
