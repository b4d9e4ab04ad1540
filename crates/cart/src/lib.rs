//! Storefront Cart - cart state manager.
//!
//! Keeps one shopping cart consistent across a guest session, backed by a
//! local JSON slot, and an authenticated session, backed by a remote REST
//! cart API. Guest lines are replayed into the remote cart at login; the
//! guest slot is reloaded at logout.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_cart::{CartConfig, CartManager, SessionCredential};
//! use storefront_cart_core::NewCartItem;
//!
//! let config = CartConfig::from_env()?;
//! let cart = CartManager::new(&config);
//!
//! cart.add_item(NewCartItem::new("p1", "Tee", price, 2).with_size("M")).await?;
//! let report = cart.login(SessionCredential::new(cookie)).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod remote;
pub mod store;
pub mod telemetry;

pub use backend::{CartBackend, CartOp, LocalBackend, RemoteBackend};
pub use config::{CartConfig, ConfigError, RemoteCartConfig};
pub use error::CartError;
pub use manager::{CartManager, SyncFailure, SyncReport};
pub use remote::{RemoteCartClient, RemoteError, SessionCredential};
pub use store::{GuestCartStore, StoreError};
