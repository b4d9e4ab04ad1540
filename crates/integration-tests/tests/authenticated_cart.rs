//! Integration tests for authenticated carts against the mock cart API.

use std::time::Duration;

use rust_decimal::Decimal;
use storefront_cart::{CartError, CartManager, SessionCredential};
use storefront_cart_core::{NewCartItem, SessionMode};
use storefront_cart_integration_tests::{MockCartApi, TEST_SESSION, credential};
use tempfile::TempDir;

fn item(product: &str, size: &str, quantity: i64) -> NewCartItem {
    NewCartItem::new(product, "Item", Decimal::new(500, 2), quantity).with_size(size)
}

/// Manager that has resumed an authenticated session against `api`.
async fn authenticated(api: &MockCartApi, tmp: &TempDir) -> CartManager {
    let cart = api.manager(tmp.path());
    cart.resume_authenticated(credential())
        .await
        .expect("Resume failed");
    cart
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn test_resume_adopts_server_cart() {
    let api = MockCartApi::start().await;
    api.seed(item("p9", "M", 2));
    let tmp = TempDir::new().expect("Failed to create temp dir");

    let cart = authenticated(&api, &tmp).await;
    let state = cart.snapshot();

    assert_eq!(state.session(), SessionMode::Authenticated);
    assert_eq!(state.items(), &api.lines());
    assert_eq!(state.total_quantity(), 2);
    assert!(!state.is_syncing());
}

#[tokio::test]
async fn test_requests_carry_cookie_and_request_id() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");

    let cart = authenticated(&api, &tmp).await;
    cart.add_item(item("p1", "M", 1)).await.expect("Add failed");

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    let expected_cookie = format!("session={TEST_SESSION}");
    for request in &requests {
        assert_eq!(request.cookie.as_deref(), Some(expected_cookie.as_str()));
        assert!(request.request_id.as_deref().is_some_and(|id| id.len() == 36));
    }
    assert_ne!(requests[0].request_id, requests[1].request_id);
}

#[tokio::test]
async fn test_wrong_credential_is_rejected() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = api.manager(tmp.path());

    let err = cart
        .resume_authenticated(SessionCredential::new("stale"))
        .await
        .expect_err("Resume should fail");

    assert_eq!(
        err,
        CartError::RemoteRejected {
            status: Some(401),
            message: "session expired".to_string()
        }
    );
    assert!(cart.snapshot().last_error().is_some());
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_add_replaces_items_with_server_response() {
    let api = MockCartApi::start().await;
    api.seed(item("p9", "M", 1));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    // Someone else added to the account cart since we fetched.
    api.seed(item("p8", "S", 4));
    let state = cart.add_item(item("p1", "M", 2)).await.expect("Add failed");

    assert_eq!(state.items(), &api.lines());
    assert_eq!(state.unique_line_count(), 3);
    assert_eq!(state.total_quantity(), 7);
    assert!(!guest_slot_exists(&tmp));
}

#[tokio::test]
async fn test_update_and_remove_address_line_by_key() {
    let api = MockCartApi::start().await;
    api.seed(item("p1", "M", 1));
    api.seed(item("a:b/c", "L", 1));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    let odd = cart.snapshot().items().as_slice()[1].line_key().clone();
    let state = cart.update_quantity(&odd, 6).await.expect("Update failed");
    assert_eq!(state.items().get(&odd).map(|l| l.quantity().get()), Some(6));

    let last = api.requests().pop().expect("No request recorded");
    assert_eq!(last.route, "PUT /cart/{line_key}");
    assert_eq!(last.line_key.as_deref(), Some(odd.as_str()));

    let state = cart.update_quantity(&odd, 0).await.expect("Remove failed");
    assert!(state.items().get(&odd).is_none());
    assert_eq!(api.requests().pop().map(|r| r.route), Some("DELETE /cart/{line_key}"));
}

#[tokio::test]
async fn test_clear_empties_remote_cart() {
    let api = MockCartApi::start().await;
    api.seed(item("p1", "M", 3));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    let state = cart.clear().await.expect("Clear failed");

    assert!(state.items().is_empty());
    assert!(api.lines().is_empty());
}

#[tokio::test]
async fn test_fetch_remote_picks_up_server_changes() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    api.seed(item("p2", "XL", 2));
    let state = cart.fetch_remote().await.expect("Fetch failed");

    assert_eq!(state.items(), &api.lines());
    assert!(state.last_error().is_none());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_rejected_add_leaves_items_unchanged() {
    let api = MockCartApi::start().await;
    api.seed(item("p1", "M", 1));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;
    let before = cart.snapshot();

    api.with_state(|s| {
        s.reject_products.insert("sold-out".to_string());
    });
    let err = cart
        .add_item(item("sold-out", "M", 1))
        .await
        .expect_err("Add should fail");

    assert_eq!(
        err,
        CartError::RemoteRejected {
            status: Some(422),
            message: "out of stock".to_string()
        }
    );
    let after = cart.snapshot();
    assert_eq!(after.items(), before.items());
    assert_eq!(after.totals(), before.totals());
    assert_eq!(
        after.last_error(),
        Some("Remote rejected request (HTTP 422): out of stock")
    );
    assert!(!after.is_syncing());
}

#[tokio::test]
async fn test_timeout_is_network_failure() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    api.with_state(|s| s.delay = Some(Duration::from_secs(2)));
    let err = cart
        .add_item(item("p1", "M", 1))
        .await
        .expect_err("Add should time out");

    assert!(matches!(err, CartError::NetworkFailure(_)), "got {err:?}");
    assert!(cart.snapshot().items().is_empty());
}

#[tokio::test]
async fn test_server_error_is_remote_rejection() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    api.with_state(|s| s.fail_reads = true);
    let err = cart.fetch_remote().await.expect_err("Fetch should fail");

    assert_eq!(
        err,
        CartError::RemoteRejected {
            status: Some(503),
            message: "cart service unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn test_invalid_payload_never_enters_state() {
    let api = MockCartApi::start().await;
    api.seed(item("p1", "M", 1));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;
    let before = cart.snapshot();

    api.with_state(|s| s.malformed_reads = true);
    let err = cart.fetch_remote().await.expect_err("Fetch should fail");

    assert!(matches!(err, CartError::InvalidResponse(_)), "got {err:?}");
    assert_eq!(cart.snapshot().items(), before.items());
}

#[tokio::test]
async fn test_unrepresentable_total_is_invalid_response() {
    let api = MockCartApi::start().await;
    api.seed(item("p1", "M", 1));
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;
    let before = cart.snapshot();

    api.with_state(|s| s.oversized_reads = true);
    let err = cart.fetch_remote().await.expect_err("Fetch should fail");

    assert!(matches!(err, CartError::InvalidResponse(_)), "got {err:?}");
    let after = cart.snapshot();
    assert_eq!(after.items(), before.items());
    assert_eq!(after.totals(), before.totals());
    assert!(!after.is_syncing());
}

#[tokio::test]
async fn test_rate_limit_is_remote_rejection() {
    let api = MockCartApi::start().await;
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let cart = authenticated(&api, &tmp).await;

    api.with_state(|s| s.rate_limited = true);
    let err = cart.clear().await.expect_err("Clear should fail");

    assert_eq!(
        err,
        CartError::RemoteRejected {
            status: Some(429),
            message: "rate limited, retry after 7 seconds".to_string()
        }
    );
}

fn guest_slot_exists(tmp: &TempDir) -> bool {
    storefront_cart_integration_tests::guest_store(tmp.path())
        .path()
        .exists()
}
