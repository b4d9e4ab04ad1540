//! Observable cart state.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::lines::{CartLines, CartTotals};
use crate::types::session::SessionMode;

/// Snapshot of the cart as the UI sees it.
///
/// The aggregates are private and only change through
/// [`CartState::replace_lines`], which recomputes them from the new lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    items: CartLines,
    #[serde(flatten)]
    totals: CartTotals,
    is_syncing: bool,
    last_error: Option<String>,
    session: SessionMode,
}

impl CartState {
    /// An empty guest cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cart lines.
    #[must_use]
    pub const fn items(&self) -> &CartLines {
        &self.items
    }

    /// All aggregates at once.
    #[must_use]
    pub const fn totals(&self) -> CartTotals {
        self.totals
    }

    /// Sum of all quantities.
    #[must_use]
    pub const fn total_quantity(&self) -> u64 {
        self.totals.total_quantity
    }

    /// Number of distinct lines.
    #[must_use]
    pub const fn unique_line_count(&self) -> usize {
        self.totals.unique_line_count
    }

    /// Sum of `unit_price × quantity`.
    #[must_use]
    pub const fn total_value(&self) -> Decimal {
        self.totals.total_value
    }

    /// `true` while a remote operation is outstanding.
    #[must_use]
    pub const fn is_syncing(&self) -> bool {
        self.is_syncing
    }

    /// Failure message of the last operation, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current session mode.
    #[must_use]
    pub const fn session(&self) -> SessionMode {
        self.session
    }

    /// Replace the lines and recompute every aggregate.
    pub fn replace_lines(&mut self, lines: CartLines) {
        self.totals = lines.totals();
        self.items = lines;
    }

    /// Set the syncing flag.
    pub const fn set_syncing(&mut self, syncing: bool) {
        self.is_syncing = syncing;
    }

    /// Record (or clear) the last error message.
    pub fn set_last_error(&mut self, message: Option<String>) {
        self.last_error = message;
    }

    /// Set the session mode.
    pub const fn set_session(&mut self, session: SessionMode) {
        self.session = session;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::item::NewCartItem;

    #[test]
    fn test_replace_lines_recomputes_totals() {
        let mut state = CartState::new();
        let mut lines = CartLines::new();
        lines.merge(
            NewCartItem::new("p1", "Tee", "12.50".parse().unwrap(), 2)
                .validate()
                .unwrap(),
        ).unwrap();
        state.replace_lines(lines);

        assert_eq!(state.total_quantity(), 2);
        assert_eq!(state.unique_line_count(), 1);
        assert_eq!(state.total_value(), "25.00".parse::<Decimal>().unwrap());

        state.replace_lines(CartLines::new());
        assert_eq!(state.totals(), CartTotals::default());
    }

    #[test]
    fn test_serializes_flat_aggregates() {
        let mut state = CartState::new();
        state.set_last_error(Some("boom".to_string()));
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["items"], serde_json::json!([]));
        assert_eq!(json["totalQuantity"], 0);
        assert_eq!(json["uniqueLineCount"], 0);
        assert_eq!(json["isSyncing"], false);
        assert_eq!(json["lastError"], "boom");
        assert_eq!(json["session"], "guest");
    }
}
