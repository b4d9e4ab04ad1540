//! Cart state manager.
//!
//! [`CartManager`] owns the cart of one browsing session. It exposes a single
//! mutation API for guest and authenticated sessions, routes every call
//! through the active [`CartBackend`], and publishes a fresh [`CartState`]
//! after each change.
//!
//! # Session lifecycle
//!
//! ```text
//! Guest --login--> SyncingToAuthenticated --> Authenticated --logout--> Guest
//! ```
//!
//! Login replays every guest line into the remote cart, then adopts the
//! remote cart and erases the guest slot. Logout drops the remote cart and
//! reloads the guest slot.
//!
//! # Concurrency
//!
//! Mutating calls are serialized. A call made while another is outstanding
//! fails immediately with [`CartError::SyncInProgress`] instead of queueing
//! behind it, mirroring a UI that disables its controls while
//! [`CartState::is_syncing`] is set.
//!
//! A call whose future is dropped before it completes leaves the cart as it
//! was, with `is_syncing` cleared. An interrupted login leaves the session
//! authenticated, keeps the guest slot, and sets `last_error`.

use std::sync::Arc;

use futures::future::join_all;
use storefront_cart_core::{
    CartLineItem, CartLines, CartState, LineKey, NewCartItem, Quantity, SessionMode,
};
use tokio::sync::{Mutex, watch};
use tracing::{info, instrument, warn};

use crate::backend::{CartBackend, CartOp, LocalBackend, RemoteBackend};
use crate::config::{CartConfig, RemoteCartConfig};
use crate::error::{CartError, add_breadcrumb};
use crate::remote::{RemoteCartClient, SessionCredential};
use crate::store::GuestCartStore;

/// Outcome of replaying the guest cart at login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Guest lines that were sent to the remote cart.
    pub attempted: usize,
    /// Lines the remote cart accepted.
    pub synced: usize,
    /// Lines the remote cart did not accept, with the reason.
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    /// `true` if every guest line was accepted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A guest line that could not be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Key of the line.
    pub line_key: LineKey,
    /// Why the remote add failed.
    pub error: CartError,
}

/// The backend serving the current session.
struct ActiveSession {
    mode: SessionMode,
    backend: Arc<dyn CartBackend>,
}

/// Clears the in-flight markers of an operation that did not finish.
struct InFlight<'a> {
    state: &'a watch::Sender<CartState>,
}

impl<'a> InFlight<'a> {
    const fn new(state: &'a watch::Sender<CartState>) -> Self {
        Self { state }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| {
            let interrupted_sync = s.session() == SessionMode::SyncingToAuthenticated;
            if !s.is_syncing() && !interrupted_sync {
                return false;
            }
            s.set_syncing(false);
            if interrupted_sync {
                warn!("Guest cart sync interrupted; keeping guest slot");
                s.set_session(SessionMode::Authenticated);
                s.set_last_error(Some("guest cart sync was interrupted".to_string()));
            }
            true
        });
    }
}

/// Cart state manager.
///
/// Cheap to clone; clones share one cart. Construct it once at application
/// start and hand clones to whatever needs the cart.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    remote_config: RemoteCartConfig,
    guest_store: GuestCartStore,
    session: Mutex<ActiveSession>,
    state: watch::Sender<CartState>,
}

impl CartManager {
    /// Create a guest-mode manager from configuration, hydrated from the
    /// guest slot.
    #[must_use]
    pub fn new(config: &CartConfig) -> Self {
        Self::from_parts(
            config.remote.clone(),
            GuestCartStore::new(config.guest_store_path.clone()),
        )
    }

    /// Create a guest-mode manager from its collaborators, hydrated from the
    /// guest slot.
    ///
    /// An unreadable slot starts the cart empty with `last_error` set.
    #[must_use]
    pub fn from_parts(remote_config: RemoteCartConfig, guest_store: GuestCartStore) -> Self {
        let mut state = CartState::new();
        match guest_store.load() {
            Ok(lines) => state.replace_lines(lines),
            Err(e) => {
                let err = CartError::from(e);
                err.report();
                state.set_last_error(Some(err.to_string()));
            }
        }

        let backend: Arc<dyn CartBackend> = Arc::new(LocalBackend::new(guest_store.clone()));
        let (state, _) = watch::channel(state);

        Self {
            inner: Arc::new(CartManagerInner {
                remote_config,
                guest_store,
                session: Mutex::new(ActiveSession {
                    mode: SessionMode::Guest,
                    backend,
                }),
                state,
            }),
        }
    }

    /// Current cart state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receive every subsequent state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Current session mode.
    #[must_use]
    pub fn session_mode(&self) -> SessionMode {
        self.inner.state.borrow().session()
    }

    /// Add a line, merging with an existing line of the same product and
    /// variant.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity`/`InvalidItem` for bad input, `SyncInProgress`
    /// if another operation is outstanding, or the remote failure. The cart
    /// is unchanged on error.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn add_item(&self, item: NewCartItem) -> Result<CartState, CartError> {
        let session = self.begin()?;
        let line = item.validate().map_err(|e| self.fail(e.into()))?;
        self.apply(&session, CartOp::Add(line)).await
    }

    /// Remove a line. Removing a line that is not in the cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` or the remote failure. The cart is unchanged
    /// on error.
    #[instrument(skip(self), fields(line_key = %key))]
    pub async fn remove_item(&self, key: &LineKey) -> Result<CartState, CartError> {
        let session = self.begin()?;
        self.apply(&session, CartOp::Remove(key.clone())).await
    }

    /// Set a line's quantity. A quantity of zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for quantities above `u32::MAX`,
    /// `SyncInProgress`, or the remote failure. The cart is unchanged on
    /// error.
    #[instrument(skip(self), fields(line_key = %key))]
    pub async fn update_quantity(
        &self,
        key: &LineKey,
        quantity: i64,
    ) -> Result<CartState, CartError> {
        let session = self.begin()?;
        let op = if quantity <= 0 {
            CartOp::Remove(key.clone())
        } else {
            let quantity = Quantity::new(quantity).map_err(|e| self.fail(e.into()))?;
            CartOp::SetQuantity(key.clone(), quantity)
        };
        self.apply(&session, op).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` or the remote failure. The cart is unchanged
    /// on error.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<CartState, CartError> {
        let session = self.begin()?;
        self.apply(&session, CartOp::Clear).await
    }

    /// Replace the cart with the remote cart.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` in a guest session, `SyncInProgress`, or
    /// the remote failure. The cart is unchanged on error.
    #[instrument(skip(self))]
    pub async fn fetch_remote(&self) -> Result<CartState, CartError> {
        let session = self.begin()?;
        if session.mode != SessionMode::Authenticated {
            return Err(self.fail(CartError::NotAuthenticated));
        }
        self.reload(session.backend.as_ref()).await
    }

    /// Start an already-authenticated session (e.g., the app launched with a
    /// valid session cookie). No guest replay happens; the remote cart is
    /// fetched and adopted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the session is a guest session,
    /// `RemoteRejected` for an unusable credential, or the fetch failure. On a
    /// failed fetch the session is still authenticated and the cart is
    /// unchanged; call [`CartManager::fetch_remote`] to retry.
    #[instrument(skip(self, credential))]
    pub async fn resume_authenticated(
        &self,
        credential: SessionCredential,
    ) -> Result<CartState, CartError> {
        let mut session = self.begin()?;
        if session.mode != SessionMode::Guest {
            return Err(self.fail(CartError::InvalidTransition {
                from: session.mode,
                to: SessionMode::Authenticated,
            }));
        }

        let backend = self.remote_backend(&credential)?;
        session.mode = SessionMode::Authenticated;
        session.backend = backend;
        self.inner
            .state
            .send_modify(|s| s.set_session(SessionMode::Authenticated));
        add_breadcrumb("cart", "Resumed authenticated cart", None);

        self.reload(session.backend.as_ref()).await
    }

    /// Log in: replay the guest cart into the remote cart bound to
    /// `credential`, then adopt the remote cart.
    ///
    /// # Errors
    ///
    /// See [`CartManager::sync_guest_cart_on_login`]. A credential that
    /// cannot be sent is `RemoteRejected` and leaves the session a guest
    /// session.
    #[instrument(skip(self, credential))]
    pub async fn login(&self, credential: SessionCredential) -> Result<SyncReport, CartError> {
        let remote = self.remote_backend(&credential)?;
        self.sync_guest_cart_on_login(remote).await
    }

    /// Reconcile the guest cart into `remote` at the guest→authenticated
    /// transition.
    ///
    /// Every guest line is sent as its own remote add; all adds run
    /// concurrently and are awaited. Lines that fail are reported but do not
    /// undo lines that succeeded. Afterwards the remote cart is fetched and
    /// adopted, and the guest slot is erased.
    ///
    /// If the final fetch fails, the session is authenticated but the guest
    /// slot is kept and the cart still shows the guest lines.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the session is a guest session,
    /// `SyncInProgress`, or the failure of the final fetch.
    #[instrument(skip(self, remote))]
    pub async fn sync_guest_cart_on_login(
        &self,
        remote: Arc<dyn CartBackend>,
    ) -> Result<SyncReport, CartError> {
        let mut session = self.begin()?;
        if session.mode != SessionMode::Guest {
            return Err(self.fail(CartError::InvalidTransition {
                from: session.mode,
                to: SessionMode::SyncingToAuthenticated,
            }));
        }

        let guest_lines = self.inner.state.borrow().items().clone();
        // Held until the end of the sync, so only the published state shows
        // the intermediate mode.
        session.mode = SessionMode::Authenticated;
        session.backend = Arc::clone(&remote);
        let _in_flight = InFlight::new(&self.inner.state);
        self.inner.state.send_modify(|s| {
            s.set_session(SessionMode::SyncingToAuthenticated);
            s.set_syncing(true);
        });
        info!(lines = guest_lines.len(), "Syncing guest cart after login");

        let report = replay_guest_lines(remote.as_ref(), &guest_lines).await;

        self.inner
            .state
            .send_modify(|s| s.set_session(SessionMode::Authenticated));

        let lines = match remote.load().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Remote cart fetch failed after login; keeping guest slot");
                return Err(self.fail(e));
            }
        };

        let mut problems = Vec::new();
        if !report.is_complete() {
            problems.push(format!(
                "{} of {} guest cart lines could not be synced",
                report.failed.len(),
                report.attempted
            ));
        }
        if let Err(e) = self.inner.guest_store.clear() {
            let err = CartError::from(e);
            err.report();
            problems.push(err.to_string());
        }
        let last_error = (!problems.is_empty()).then(|| problems.join("; "));

        self.inner.state.send_modify(|s| {
            s.replace_lines(lines);
            s.set_syncing(false);
            s.set_last_error(last_error);
        });

        let attempted = report.attempted.to_string();
        let synced = report.synced.to_string();
        add_breadcrumb(
            "cart",
            "Synced guest cart on login",
            Some(&[("attempted", attempted.as_str()), ("synced", synced.as_str())]),
        );
        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed.len(),
            "Guest cart synced"
        );
        Ok(report)
    }

    /// Log out: drop the authenticated cart and reload the guest slot.
    ///
    /// Waits for any outstanding operation rather than failing.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the slot cannot be read; the session
    /// is a guest session with an empty cart in that case.
    #[instrument(skip(self))]
    pub async fn load_guest_cart_on_logout(&self) -> Result<CartState, CartError> {
        let mut session = self.inner.session.lock().await;
        session.mode = SessionMode::Guest;
        session.backend = Arc::new(LocalBackend::new(self.inner.guest_store.clone()));

        let loaded = self.inner.guest_store.load().map_err(CartError::from);
        let (lines, result) = match loaded {
            Ok(lines) => (lines, Ok(())),
            Err(e) => {
                e.report();
                (CartLines::new(), Err(e))
            }
        };
        let last_error = result.as_ref().err().map(ToString::to_string);

        self.inner.state.send_modify(|s| {
            s.set_session(SessionMode::Guest);
            s.replace_lines(lines);
            s.set_syncing(false);
            s.set_last_error(last_error);
        });
        add_breadcrumb("cart", "Reloaded guest cart on logout", None);

        result.map(|()| self.snapshot())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Claim the session for one operation, or fail if another is running.
    fn begin(&self) -> Result<tokio::sync::MutexGuard<'_, ActiveSession>, CartError> {
        self.inner.session.try_lock().map_err(|_| {
            let err = CartError::SyncInProgress;
            err.report();
            err
        })
    }

    /// Record a failure in the state and hand it back.
    fn fail(&self, err: CartError) -> CartError {
        err.report();
        let message = err.to_string();
        self.inner.state.send_modify(|s| {
            s.set_syncing(false);
            s.set_last_error(Some(message));
        });
        err
    }

    fn remote_backend(
        &self,
        credential: &SessionCredential,
    ) -> Result<Arc<dyn CartBackend>, CartError> {
        let client = RemoteCartClient::new(&self.inner.remote_config, credential)
            .map_err(|e| self.fail(e.into()))?;
        Ok(Arc::new(RemoteBackend::new(client)))
    }

    /// Run one operation through the active backend and adopt its result.
    async fn apply(&self, session: &ActiveSession, op: CartOp) -> Result<CartState, CartError> {
        let _in_flight = InFlight::new(&self.inner.state);
        if session.backend.mode().is_remote() {
            self.inner.state.send_modify(|s| s.set_syncing(true));
        }

        let name = op.name();
        let line_key = op.line_key().map(ToString::to_string).unwrap_or_default();
        let current = self.inner.state.borrow().items().clone();

        let applied = session
            .backend
            .apply(&current, op)
            .await
            .map_err(|e| self.fail(e))?;

        let warning = applied.warning.map(|w| {
            w.report();
            w.to_string()
        });
        self.inner.state.send_modify(|s| {
            s.replace_lines(applied.lines);
            s.set_syncing(false);
            s.set_last_error(warning);
        });

        let mode = session.mode.to_string();
        add_breadcrumb(
            "cart",
            name,
            Some(&[("line_key", line_key.as_str()), ("mode", mode.as_str())]),
        );
        Ok(self.snapshot())
    }

    /// Replace the cart with whatever `backend` holds.
    async fn reload(&self, backend: &dyn CartBackend) -> Result<CartState, CartError> {
        let _in_flight = InFlight::new(&self.inner.state);
        self.inner.state.send_modify(|s| s.set_syncing(true));
        let lines = backend.load().await.map_err(|e| self.fail(e))?;
        self.inner.state.send_modify(|s| {
            s.replace_lines(lines);
            s.set_syncing(false);
            s.set_last_error(None);
        });
        Ok(self.snapshot())
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("guest_store", &self.inner.guest_store)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Send every guest line to `remote` concurrently and wait for all of them.
async fn replay_guest_lines(remote: &dyn CartBackend, guest_lines: &CartLines) -> SyncReport {
    let empty = CartLines::new();
    let results = join_all(guest_lines.iter().map(|line: &CartLineItem| {
        let empty = &empty;
        async move {
            let outcome = remote.apply(empty, CartOp::Add(line.clone())).await;
            (line.line_key().clone(), outcome)
        }
    }))
    .await;

    let mut report = SyncReport {
        attempted: results.len(),
        ..SyncReport::default()
    };
    for (line_key, outcome) in results {
        match outcome {
            Ok(_) => report.synced += 1,
            Err(error) => {
                warn!(line_key = %line_key, error = %error, "Guest cart line not synced");
                report.failed.push(SyncFailure { line_key, error });
            }
        }
    }
    report
}
