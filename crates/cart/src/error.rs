//! Cart error taxonomy with Sentry integration.
//!
//! [`CartError`] is the only error type that crosses the manager boundary.
//! Lower layers (`RemoteError`, `StoreError`, `CartItemError`) convert into it.
//! Every variant is `Clone` so the same failure can be returned to the caller
//! and rendered into `CartState::last_error`.

use storefront_cart_core::{CartItemError, SessionMode};
use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors surfaced by the cart state manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The remote call did not complete (connection, timeout, body read).
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The remote cart API answered with a non-success status.
    #[error("Remote rejected request{}: {message}", format_status(.status))]
    RemoteRejected {
        /// HTTP status, if the rejection came from a response.
        status: Option<u16>,
        /// Server-provided or synthesized message.
        message: String,
    },

    /// The local guest store could not be read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Quantity is not a positive integer.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Candidate line failed validation for another reason.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// The remote response did not match the cart schema.
    #[error("Invalid cart response: {0}")]
    InvalidResponse(String),

    /// The operation needs an authenticated session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session cannot move from its current mode to the requested one.
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition {
        /// Mode at the time of the call.
        from: SessionMode,
        /// Requested mode.
        to: SessionMode,
    },

    /// Another cart operation is still outstanding.
    #[error("Cart operation already in progress")]
    SyncInProgress,

    /// The remote client could not be built from configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[allow(clippy::ref_option)]
fn format_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
}

impl CartError {
    /// Log the error and, for failures that indicate a broken collaborator,
    /// capture it to Sentry.
    pub fn report(&self) {
        match self {
            Self::NetworkFailure(_) | Self::InvalidResponse(_) | Self::Configuration(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart operation failed"
                );
            }
            Self::RemoteRejected {
                status: Some(status),
                ..
            } if *status >= 500 => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart operation failed"
                );
            }
            Self::RemoteRejected { .. } | Self::StorageUnavailable(_) => {
                tracing::warn!(error = %self, "Cart operation failed");
            }
            Self::InvalidQuantity(_)
            | Self::InvalidItem(_)
            | Self::NotAuthenticated
            | Self::InvalidTransition { .. }
            | Self::SyncInProgress => {
                tracing::debug!(error = %self, "Cart operation rejected");
            }
        }
    }
}

impl From<CartItemError> for CartError {
    fn from(err: CartItemError) -> Self {
        match err {
            CartItemError::InvalidQuantity(quantity) => Self::InvalidQuantity(quantity),
            other => Self::InvalidItem(other.to_string()),
        }
    }
}

impl From<StoreError> for CartError {
    fn from(err: StoreError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<RemoteError> for CartError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Http(e) => Self::NetworkFailure(e.to_string()),
            RemoteError::Api { status, message } | RemoteError::Unauthorized { status, message } => {
                Self::RemoteRejected {
                    status: Some(status),
                    message,
                }
            }
            RemoteError::RateLimited(retry_after) => Self::RemoteRejected {
                status: Some(429),
                message: format!("rate limited, retry after {retry_after} seconds"),
            },
            RemoteError::InvalidCredential(message) => Self::RemoteRejected {
                status: None,
                message,
            },
            RemoteError::Malformed(message) => Self::InvalidResponse(message),
            RemoteError::InvalidBaseUrl(url) => {
                Self::Configuration(format!("cart API base URL cannot be a base: {url}"))
            }
        }
    }
}

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("line_key", "p1:M:")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
