//! Storefront Cart Core - Shared cart types.
//!
//! This crate provides the types used by the cart state manager and its
//! consumers:
//! - `storefront-cart` - Cart state manager, guest store, remote cart client
//! - UI layers that render [`CartState`] snapshots
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O, no
//! HTTP clients, no persistence. Every mutation of a line collection returns
//! the new collection; the manager decides where it gets stored.
//!
//! # Modules
//!
//! - [`types`] - Line items, line keys, quantities, totals and cart state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
