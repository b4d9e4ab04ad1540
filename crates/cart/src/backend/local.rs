//! Guest-session backend.

use async_trait::async_trait;
use storefront_cart_core::{CartLines, SessionMode};
use tracing::{instrument, warn};

use crate::backend::{Applied, CartBackend, CartOp};
use crate::error::CartError;
use crate::store::GuestCartStore;

/// Applies operations in memory and persists the result to the guest store.
///
/// A failed write does not fail the operation: the new cart is returned with
/// the storage error attached as a warning. An operation the lines reject
/// fails before anything is written.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    store: GuestCartStore,
}

impl LocalBackend {
    /// Create a backend persisting to `store`.
    #[must_use]
    pub const fn new(store: GuestCartStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CartBackend for LocalBackend {
    fn mode(&self) -> SessionMode {
        SessionMode::Guest
    }

    async fn load(&self) -> Result<CartLines, CartError> {
        Ok(self.store.load()?)
    }

    #[instrument(skip(self, current, op), fields(op = op.name()))]
    async fn apply(&self, current: &CartLines, op: CartOp) -> Result<Applied, CartError> {
        let mut lines = current.clone();

        let persisted = match op {
            CartOp::Add(line) => {
                lines.merge(line)?;
                self.store.save(&lines)
            }
            CartOp::Remove(key) => {
                lines.remove(&key);
                self.store.save(&lines)
            }
            CartOp::SetQuantity(key, quantity) => {
                lines.set_quantity(&key, quantity)?;
                self.store.save(&lines)
            }
            CartOp::Clear => {
                lines = CartLines::new();
                self.store.clear()
            }
        };

        let warning = persisted.err().map(|e| {
            warn!(error = %e, "Guest cart not persisted; keeping in-memory cart");
            CartError::from(e)
        });

        Ok(Applied { lines, warning })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use storefront_cart_core::{NewCartItem, Quantity};
    use tempfile::TempDir;

    use super::*;

    fn item(product: &str, size: &str, qty: i64) -> storefront_cart_core::CartLineItem {
        NewCartItem::new(product, "Item", "10".parse().unwrap(), qty)
            .with_size(size)
            .validate()
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_persists() {
        let tmp = TempDir::new().unwrap();
        let store = GuestCartStore::new(tmp.path().join("cart.json"));
        let backend = LocalBackend::new(store.clone());

        let applied = backend
            .apply(&CartLines::new(), CartOp::Add(item("p1", "M", 2)))
            .await
            .unwrap();

        assert!(applied.warning.is_none());
        assert_eq!(applied.lines.len(), 1);
        assert_eq!(store.load().unwrap(), applied.lines);
    }

    #[tokio::test]
    async fn test_does_not_touch_current() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(GuestCartStore::new(tmp.path().join("cart.json")));

        let mut current = CartLines::new();
        current.merge(item("p1", "M", 2)).unwrap();
        let key = current.iter().next().unwrap().line_key().clone();

        let applied = backend
            .apply(&current, CartOp::SetQuantity(key.clone(), Quantity::new(9).unwrap()))
            .await
            .unwrap();

        assert_eq!(current.get(&key).unwrap().quantity().get(), 2);
        assert_eq!(applied.lines.get(&key).unwrap().quantity().get(), 9);
    }

    #[tokio::test]
    async fn test_quantity_overflow_fails_without_writing() {
        let tmp = TempDir::new().unwrap();
        let store = GuestCartStore::new(tmp.path().join("cart.json"));
        let backend = LocalBackend::new(store.clone());
        let full = backend
            .apply(
                &CartLines::new(),
                CartOp::Add(item("p1", "M", i64::from(u32::MAX))),
            )
            .await
            .unwrap()
            .lines;

        let err = backend
            .apply(&full, CartOp::Add(item("p1", "M", 1)))
            .await
            .unwrap_err();

        assert_eq!(err, CartError::InvalidQuantity(i64::from(u32::MAX) + 1));
        assert_eq!(store.load().unwrap(), full);
    }

    #[tokio::test]
    async fn test_clear_erases_slot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cart.json");
        let backend = LocalBackend::new(GuestCartStore::new(&path));

        let applied = backend
            .apply(&CartLines::new(), CartOp::Add(item("p1", "M", 1)))
            .await
            .unwrap();
        assert!(path.exists());

        let cleared = backend.apply(&applied.lines, CartOp::Clear).await.unwrap();
        assert!(cleared.lines.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_storage_failure_is_a_warning() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let backend = LocalBackend::new(GuestCartStore::new(blocker.join("cart.json")));

        let applied = backend
            .apply(&CartLines::new(), CartOp::Add(item("p1", "M", 1)))
            .await
            .unwrap();

        assert_eq!(applied.lines.len(), 1);
        assert!(matches!(
            applied.warning,
            Some(CartError::StorageUnavailable(_))
        ));
    }
}
