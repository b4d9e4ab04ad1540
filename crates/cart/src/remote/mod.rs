//! Remote cart API client.
//!
//! The authenticated cart lives on the storefront backend and is reached over
//! a small REST surface. Every mutating call returns the full cart, which the
//! manager adopts as-is.
//!
//! # API Reference
//!
//! - `GET /cart` → `{ items }`
//! - `POST /cart` `{ productId, displayName, unitPrice, quantity, imageRef, size?, color? }` → `{ items }`
//! - `PUT /cart/{lineKey}` `{ quantity }` → `{ items }`
//! - `DELETE /cart/{lineKey}` → `{ items }`
//! - `DELETE /cart` → `{ items: [] }`
//!
//! Authentication: the session credential is sent as a cookie
//! (`<session_cookie>=<credential>`) on every request.

mod types;

pub use types::*;

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use storefront_cart_core::{CartLineItem, CartLines, LineKey, Quantity};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::RemoteCartConfig;

/// Header carrying the per-request correlation ID.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Errors that can occur when talking to the remote cart API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credential missing, expired or not allowed.
    #[error("Unauthorized: {status} - {message}")]
    Unauthorized { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The credential cannot be sent as a header value.
    #[error("Invalid session credential: {0}")]
    InvalidCredential(String),

    /// Response body did not match the cart schema.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The configured base URL cannot have path segments appended.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Session credential for the remote cart API.
///
/// Issued by the authentication collaborator at login. `Debug` output is
/// redacted.
#[derive(Debug, Clone)]
pub struct SessionCredential(SecretString);

impl SessionCredential {
    /// Wrap a raw credential value (e.g., a session cookie value).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    fn cookie_header(&self, cookie_name: &str) -> Result<HeaderValue, RemoteError> {
        let value = self.0.expose_secret();
        if value.is_empty() {
            return Err(RemoteError::InvalidCredential(
                "credential is empty".to_string(),
            ));
        }

        let mut header = HeaderValue::from_str(&format!("{cookie_name}={value}"))
            .map_err(|_| {
                RemoteError::InvalidCredential(
                    "credential contains characters not allowed in a cookie".to_string(),
                )
            })?;
        header.set_sensitive(true);
        Ok(header)
    }
}

/// Remote cart API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RemoteCartClient {
    inner: Arc<RemoteCartClientInner>,
}

struct RemoteCartClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for RemoteCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCartClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RemoteCartClient {
    /// Create a client bound to one session credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be encoded as a cookie, the
    /// base URL cannot carry a path, or the HTTP client fails to build.
    pub fn new(
        config: &RemoteCartConfig,
        credential: &SessionCredential,
    ) -> Result<Self, RemoteError> {
        if config.base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidBaseUrl(config.base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, credential.cookie_header(&config.session_cookie)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RemoteCartClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Fetch the authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure, non-success status or a
    /// response that does not match the cart schema.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<CartLines, RemoteError> {
        let url = self.endpoint(None)?;
        self.send(self.inner.client.get(url)).await
    }

    /// Add (or merge) one line.
    ///
    /// # Errors
    ///
    /// See [`RemoteCartClient::get_cart`].
    #[instrument(skip(self, line), fields(line_key = %line.line_key()))]
    pub async fn add_line(&self, line: &CartLineItem) -> Result<CartLines, RemoteError> {
        let url = self.endpoint(None)?;
        let body = AddLineRequest::from(line);
        self.send(self.inner.client.post(url).json(&body)).await
    }

    /// Set the quantity of one line.
    ///
    /// # Errors
    ///
    /// See [`RemoteCartClient::get_cart`].
    #[instrument(skip(self), fields(line_key = %key))]
    pub async fn update_quantity(
        &self,
        key: &LineKey,
        quantity: Quantity,
    ) -> Result<CartLines, RemoteError> {
        let url = self.endpoint(Some(key))?;
        let body = UpdateQuantityRequest {
            quantity: quantity.get(),
        };
        self.send(self.inner.client.put(url).json(&body)).await
    }

    /// Delete one line.
    ///
    /// # Errors
    ///
    /// See [`RemoteCartClient::get_cart`].
    #[instrument(skip(self), fields(line_key = %key))]
    pub async fn remove_line(&self, key: &LineKey) -> Result<CartLines, RemoteError> {
        let url = self.endpoint(Some(key))?;
        self.send(self.inner.client.delete(url)).await
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// See [`RemoteCartClient::get_cart`].
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<CartLines, RemoteError> {
        let url = self.endpoint(None)?;
        self.send(self.inner.client.delete(url)).await
    }

    /// `<base>/cart` or `<base>/cart/<lineKey>`.
    ///
    /// The line key is pushed as a single segment, so any `%` it contains is
    /// escaped once more and decoded back by the server's router.
    fn endpoint(&self, key: Option<&LineKey>) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| RemoteError::InvalidBaseUrl(self.inner.base_url.to_string()))?;
            segments.pop_if_empty().push("cart");
            if let Some(key) = key {
                segments.push(key.as_str());
            }
        }
        Ok(url)
    }

    /// Send a request tagged with a fresh request ID and parse the cart.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<CartLines, RemoteError> {
        let request_id = Uuid::new_v4();
        let response = request
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await?;

        debug!(
            request_id = %request_id,
            status = %response.status(),
            "Cart API responded"
        );
        self.handle_response(response, request_id).await
    }

    /// Handle API response and parse the cart body.
    async fn handle_response(
        &self,
        response: reqwest::Response,
        request_id: Uuid,
    ) -> Result<CartLines, RemoteError> {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::parse_error(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str::<CartResponse>(&body)
            .map(|cart| cart.items)
            .map_err(|e| {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse cart response"
                );
                RemoteError::Malformed(e.to_string())
            })
    }

    /// Parse error response from the cart API.
    async fn parse_error(response: reqwest::Response) -> RemoteError {
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return RemoteError::RateLimited(retry_after);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                let snippet: String = text.chars().take(200).collect();
                if snippet.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    snippet
                }
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            _ => RemoteError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}
