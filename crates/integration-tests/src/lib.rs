//! Integration tests for the storefront cart.
//!
//! The tests drive a real [`CartManager`] against [`MockCartApi`], an
//! in-process axum server implementing the remote cart API, and a guest store
//! in a temporary directory. No external services are needed:
//!
//! ```bash
//! cargo test -p storefront-cart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_cart` - Guest-session mutations and persistence
//! - `authenticated_cart` - Remote-backed mutations and failure mapping
//! - `session_transitions` - Login sync, logout, operation serialization

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use storefront_cart::{CartManager, GuestCartStore, RemoteCartConfig, SessionCredential};
use storefront_cart_core::{CartLineItem, CartLines, NewCartItem, Quantity};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Session cookie value the mock accepts.
pub const TEST_SESSION: &str = "test-session-token";

/// Timeout used by managers built from [`MockCartApi::remote_config`].
pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Route label, e.g. `PUT /cart/{line_key}`.
    pub route: &'static str,
    /// Decoded line key from the path, if the route has one.
    pub line_key: Option<String>,
    /// Raw `Cookie` header.
    pub cookie: Option<String>,
    /// `X-Request-Id` header.
    pub request_id: Option<String>,
}

/// Mutable state of the mock, including failure switches.
#[derive(Debug, Default)]
pub struct MockState {
    /// Server-side cart.
    pub lines: CartLines,
    /// Products whose add is rejected with 422.
    pub reject_products: HashSet<String>,
    /// `GET /cart` answers 503.
    pub fail_reads: bool,
    /// `GET /cart` answers 200 with a body that fails validation.
    pub malformed_reads: bool,
    /// `GET /cart` answers 200 with a line whose value is not representable.
    pub oversized_reads: bool,
    /// Every request answers 429 with `Retry-After: 7`.
    pub rate_limited: bool,
    /// Every request is held this long before being answered.
    pub delay: Option<Duration>,
    /// Every request received, in arrival order.
    pub requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process mock of the remote cart API, served under `/api/`.
///
/// Dropping the mock stops the server.
pub struct MockCartApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockCartApi {
    /// Bind `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Shared::default();

        let app = Router::new()
            .route(
                "/api/cart",
                get(get_cart).post(add_line).delete(clear_cart),
            )
            .route(
                "/api/cart/{line_key}",
                put(update_line).delete(remove_line),
            )
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock cart API");
        let addr = listener
            .local_addr()
            .expect("Failed to read mock cart API address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the API, with a path prefix.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("Mock base URL is valid")
    }

    /// Remote configuration pointing at this mock with a short timeout.
    #[must_use]
    pub fn remote_config(&self) -> RemoteCartConfig {
        let mut config = RemoteCartConfig::new(self.base_url());
        config.request_timeout = TEST_TIMEOUT;
        config
    }

    /// Guest-mode manager talking to this mock, with its slot in `dir`.
    #[must_use]
    pub fn manager(&self, dir: &Path) -> CartManager {
        CartManager::from_parts(self.remote_config(), guest_store(dir))
    }

    /// Run `f` against the mock's state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Put a line into the server-side cart.
    ///
    /// # Panics
    ///
    /// Panics if `item` is invalid or does not fit in the cart.
    pub fn seed(&self, item: NewCartItem) {
        let line = item.validate().expect("Seed item is valid");
        self.with_state(|s| s.lines.merge(line))
            .expect("Seed line fits in the cart");
    }

    /// Current server-side cart.
    #[must_use]
    pub fn lines(&self) -> CartLines {
        self.with_state(|s| s.lines.clone())
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.with_state(|s| s.requests.clone())
    }
}

impl Drop for MockCartApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Credential the mock accepts.
#[must_use]
pub fn credential() -> SessionCredential {
    SessionCredential::new(TEST_SESSION)
}

/// Guest store at the conventional path inside `dir`.
#[must_use]
pub fn guest_store(dir: &Path) -> GuestCartStore {
    GuestCartStore::new(dir.join("guest_cart.json"))
}

// =============================================================================
// Handlers
// =============================================================================

/// Body of `PUT /cart/{line_key}`.
#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: i64,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn cart_response(lines: &CartLines) -> Response {
    Json(json!({ "items": lines })).into_response()
}

/// Record the request and apply the switches every route honours.
async fn admit(
    state: &Shared,
    route: &'static str,
    line_key: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), Response> {
    let read_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    let cookie = read_header(header::COOKIE.as_str());

    let (delay, rate_limited) = {
        let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
        s.requests.push(RecordedRequest {
            route,
            line_key: line_key.map(ToString::to_string),
            cookie: cookie.clone(),
            request_id: read_header("x-request-id"),
        });
        (s.delay, s.rate_limited)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if rate_limited {
        let mut response = error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
        return Err(response);
    }

    let expected = format!("session={TEST_SESSION}");
    if cookie.as_deref() != Some(expected.as_str()) {
        return Err(error(StatusCode::UNAUTHORIZED, "session expired"));
    }
    Ok(())
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = admit(&state, "GET /cart", None, &headers).await {
        return response;
    }

    let s = state.lock().unwrap_or_else(PoisonError::into_inner);
    if s.fail_reads {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "cart service unavailable" })),
        )
            .into_response();
    }
    if s.malformed_reads {
        return Json(json!({
            "items": [{ "productId": "p1", "unitPrice": "5", "quantity": 0 }]
        }))
        .into_response();
    }
    if s.oversized_reads {
        return Json(json!({
            "items": [{
                "productId": "p1",
                "unitPrice": "79228162514264337593543950335",
                "quantity": 2
            }]
        }))
        .into_response();
    }
    cart_response(&s.lines)
}

async fn add_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = admit(&state, "POST /cart", None, &headers).await {
        return response;
    }

    let Ok(line) = serde_json::from_value::<CartLineItem>(body) else {
        return error(StatusCode::BAD_REQUEST, "invalid line");
    };

    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
    if s.reject_products.contains(line.product_id().as_str()) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "out of stock");
    }
    if let Err(e) = s.lines.merge(line) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
    }
    cart_response(&s.lines)
}

async fn update_line(
    State(state): State<Shared>,
    UrlPath(line_key): UrlPath<String>,
    headers: HeaderMap,
    Json(body): Json<QuantityBody>,
) -> Response {
    if let Err(response) =
        admit(&state, "PUT /cart/{line_key}", Some(&line_key), &headers).await
    {
        return response;
    }

    let Ok(quantity) = Quantity::new(body.quantity) else {
        return error(StatusCode::BAD_REQUEST, "invalid quantity");
    };

    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(key) = s
        .lines
        .iter()
        .find(|l| l.line_key().as_str() == line_key)
        .map(|l| l.line_key().clone())
    else {
        return error(StatusCode::NOT_FOUND, "line not found");
    };
    if let Err(e) = s.lines.set_quantity(&key, quantity) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string());
    }
    cart_response(&s.lines)
}

async fn remove_line(
    State(state): State<Shared>,
    UrlPath(line_key): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) =
        admit(&state, "DELETE /cart/{line_key}", Some(&line_key), &headers).await
    {
        return response;
    }

    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
    let key = s
        .lines
        .iter()
        .find(|l| l.line_key().as_str() == line_key)
        .map(|l| l.line_key().clone());
    if let Some(key) = key {
        s.lines.remove(&key);
    }
    cart_response(&s.lines)
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = admit(&state, "DELETE /cart", None, &headers).await {
        return response;
    }

    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
    s.lines = CartLines::new();
    cart_response(&s.lines)
}
