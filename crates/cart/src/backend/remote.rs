//! Authenticated-session backend.

use async_trait::async_trait;
use storefront_cart_core::{CartLines, SessionMode};
use tracing::instrument;

use crate::backend::{Applied, CartBackend, CartOp};
use crate::error::CartError;
use crate::remote::RemoteCartClient;

/// Forwards operations to the remote cart API and adopts the server's cart.
///
/// The current local cart is ignored: the response is the whole truth.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: RemoteCartClient,
}

impl RemoteBackend {
    /// Create a backend using `client`.
    #[must_use]
    pub const fn new(client: RemoteCartClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CartBackend for RemoteBackend {
    fn mode(&self) -> SessionMode {
        SessionMode::Authenticated
    }

    async fn load(&self) -> Result<CartLines, CartError> {
        Ok(self.client.get_cart().await?)
    }

    #[instrument(skip(self, _current, op), fields(op = op.name()))]
    async fn apply(&self, _current: &CartLines, op: CartOp) -> Result<Applied, CartError> {
        let lines = match op {
            CartOp::Add(line) => self.client.add_line(&line).await?,
            CartOp::Remove(key) => self.client.remove_line(&key).await?,
            CartOp::SetQuantity(key, quantity) => {
                self.client.update_quantity(&key, quantity).await?
            }
            CartOp::Clear => {
                self.client.clear_cart().await?;
                CartLines::new()
            }
        };
        Ok(Applied::ok(lines))
    }
}
