//! Session mode of the cart.

use serde::{Deserialize, Serialize};

/// Which store is authoritative for the cart.
///
/// Transitions: `Guest -> SyncingToAuthenticated -> Authenticated -> Guest`.
/// Only the syncing state replays guest lines into the remote cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Anonymous session; the cart lives in the local guest store.
    #[default]
    Guest,
    /// Login succeeded and guest lines are being replayed remotely.
    SyncingToAuthenticated,
    /// Verified identity; the remote cart is authoritative.
    Authenticated,
}

impl SessionMode {
    /// Returns `true` if cart operations go to the remote cart.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::SyncingToAuthenticated | Self::Authenticated)
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::SyncingToAuthenticated => write!(f, "syncing_to_authenticated"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}
