//! Wire types for the remote cart API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_cart_core::{CartLineItem, CartLines};

/// Body of every successful cart response.
///
/// Deserializing validates each line and rejects repeated line keys, so a
/// `CartResponse` is already safe to put into `CartState`.
#[derive(Debug, Clone, Deserialize)]
pub struct CartResponse {
    /// Full, authoritative cart contents.
    pub items: CartLines,
}

/// Body of `POST /cart`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest<'a> {
    /// Catalog product identifier.
    pub product_id: &'a str,
    /// Product name.
    pub display_name: &'a str,
    /// Unit price.
    pub unit_price: Decimal,
    /// Units to add.
    pub quantity: u32,
    /// Image reference.
    pub image_ref: &'a str,
    /// Size selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
    /// Color selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
}

impl<'a> From<&'a CartLineItem> for AddLineRequest<'a> {
    fn from(line: &'a CartLineItem) -> Self {
        Self {
            product_id: line.product_id().as_str(),
            display_name: line.display_name(),
            unit_price: line.unit_price(),
            quantity: line.quantity().get(),
            image_ref: line.image_ref(),
            size: line.size(),
            color: line.color(),
        }
    }
}

/// Body of `PUT /cart/{lineKey}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateQuantityRequest {
    /// New quantity for the line.
    pub quantity: u32,
}

/// Error body returned by the cart API on non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: Option<String>,
    /// Alternative field some handlers use.
    pub error: Option<String>,
}

impl ErrorBody {
    /// The best message available in the body.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storefront_cart_core::NewCartItem;

    use super::*;

    #[test]
    fn test_add_line_request_body() {
        let line = NewCartItem::new("p1", "Tee", "19.99".parse().unwrap(), 2)
            .with_size("M")
            .with_image("tee.png")
            .validate()
            .unwrap();
        let body = serde_json::to_value(AddLineRequest::from(&line)).unwrap();

        assert_eq!(body["productId"], "p1");
        assert_eq!(body["displayName"], "Tee");
        assert_eq!(body["unitPrice"], "19.99");
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["imageRef"], "tee.png");
        assert_eq!(body["size"], "M");
        assert!(body.get("color").is_none());
        assert!(body.get("lineKey").is_none());
    }

    #[test]
    fn test_cart_response_validates_lines() {
        let ok: CartResponse = serde_json::from_str(
            r#"{"items":[{"productId":"p1","displayName":"Tee","unitPrice":10,"quantity":2}]}"#,
        )
        .unwrap();
        assert_eq!(ok.items.totals().total_quantity, 2);

        let empty: CartResponse = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(empty.items.is_empty());

        assert!(serde_json::from_str::<CartResponse>(r#"{"cart":[]}"#).is_err());
        assert!(
            serde_json::from_str::<CartResponse>(
                r#"{"items":[{"productId":"p1","unitPrice":-1,"quantity":1}]}"#
            )
            .is_err()
        );
        assert!(
            serde_json::from_str::<CartResponse>(
                r#"{"items":[{"productId":"p1","unitPrice":"79228162514264337593543950335","quantity":2}]}"#
            )
            .is_err()
        );
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"out of stock"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("out of stock"));

        let body: ErrorBody = serde_json::from_str(r#"{"error":"unauthorized"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("unauthorized"));

        assert!(ErrorBody::default().into_message().is_none());
    }
}
