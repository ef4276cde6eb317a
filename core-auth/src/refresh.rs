//! # Refresh Coordinator
//!
//! Single-flight renewal of the access token.
//!
//! ## Overview
//!
//! When several requests hit a 401 at once, only the first caller of
//! [`RefreshCoordinator::ensure_fresh_credential`] starts a refresh call;
//! every later caller becomes a waiter on that call. The outcome is fanned
//! out to all waiters in the order they registered:
//!
//! ```text
//! caller A ──┐                       ┌──> A: Ok(token)
//! caller B ──┼─> [ POST /auth/refresh ] ─┼──> B: Ok(token)
//! caller C ──┘                       └──> C: Ok(token)
//! ```
//!
//! On failure (no refresh token, non-2xx, transport error, malformed body or
//! timeout) the credential store is cleared, the
//! [`SessionFailureHandler`](crate::session::SessionFailureHandler) runs, and
//! every waiter receives [`AuthError::SessionExpired`].
//!
//! ## Cancellation
//!
//! The refresh call runs on its own task. Dropping a caller's future only
//! drops that caller's waiter; the call still completes and settles everyone
//! else.

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::session::SessionFailureHandler;
use crate::types::{ExpiryReason, RefreshRequest, RefreshResponse, SessionAttributes};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

type RefreshOutcome = std::result::Result<String, ExpiryReason>;

/// Shared single-flight refresh state.
///
/// Cloning yields another handle to the same coordinator. Each
/// authenticated client stack owns exactly one.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    http_client: Arc<dyn HttpClient>,
    store: CredentialStore,
    failure_handler: Arc<SessionFailureHandler>,
    event_bus: EventBus,
    refresh_url: String,
    refresh_timeout: Duration,
    state: Mutex<RefreshState>,
    refresh_count: AtomicU64,
}

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    /// Bumped for every started refresh and on logout; a run only settles
    /// while its attempt is still current.
    attempt: u64,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

impl RefreshCoordinator {
    /// Create a coordinator.
    ///
    /// `http_client` must be the raw transport, not the authenticated client,
    /// so the refresh call itself is never intercepted.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        store: CredentialStore,
        failure_handler: Arc<SessionFailureHandler>,
        event_bus: EventBus,
        refresh_url: impl Into<String>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                http_client,
                store,
                failure_handler,
                event_bus,
                refresh_url: refresh_url.into(),
                refresh_timeout,
                state: Mutex::new(RefreshState::default()),
                refresh_count: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain a renewed access token, sharing any refresh already in flight.
    ///
    /// # Errors
    ///
    /// [`AuthError::SessionExpired`] when the refresh failed. By the time
    /// this returns, the store has been cleared and the login redirect issued.
    #[instrument(skip(self))]
    pub async fn ensure_fresh_credential(&self) -> Result<String> {
        let (sender, receiver) = oneshot::channel();

        let start = {
            let mut state = self.inner.state.lock().await;
            state.waiters.push_back(sender);
            if std::mem::replace(&mut state.in_progress, true) {
                None
            } else {
                state.attempt += 1;
                Some(state.attempt)
            }
        };

        if let Some(attempt) = start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run(attempt).await });
        } else {
            debug!("Refresh already in flight, waiting for its outcome");
        }

        match receiver.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(reason)) => {
                debug!(reason = %reason, "Refresh outcome: session expired");
                Err(AuthError::SessionExpired)
            }
            Err(_) => Err(AuthError::SessionExpired),
        }
    }

    /// Reject every registered waiter with `SessionExpired`.
    ///
    /// An in-flight refresh call keeps running but is detached: its result
    /// is discarded, and the next caller starts a fresh refresh instead of
    /// joining it.
    pub async fn reject_pending(&self) -> usize {
        let waiters = {
            let mut state = self.inner.state.lock().await;
            state.in_progress = false;
            state.attempt += 1;
            std::mem::take(&mut state.waiters)
        };
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(ExpiryReason::LoggedOut));
        }
        if count > 0 {
            info!(count, "Rejected pending requests");
        }
        count
    }

    pub async fn is_refreshing(&self) -> bool {
        self.inner.state.lock().await.in_progress
    }

    /// Number of refresh calls started by this coordinator.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::SeqCst)
    }
}

impl CoordinatorInner {
    async fn run(&self, attempt: u64) {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        match self.refresh().await {
            Ok(token) => {
                let released = self.settle(attempt, Ok(token)).await;
                info!(waiters = released, "Access token refreshed");
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { waiters: released }));
            }
            Err(ExpiryReason::LoggedOut) => {
                let rejected = self.settle(attempt, Err(ExpiryReason::LoggedOut)).await;
                info!(waiters = rejected, "Session ended during refresh");
            }
            Err(reason) if !self.is_current(attempt).await => {
                debug!(reason = %reason, "Detached refresh failed, ignoring");
            }
            Err(reason) => {
                warn!(reason = %reason, "Token refresh failed");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "Failed to clear credentials after refresh failure");
                }
                self.failure_handler.handle(&reason).await;
                let rejected = self.settle(attempt, Err(reason)).await;
                debug!(waiters = rejected, "Rejected waiters after refresh failure");
            }
        }
    }

    async fn is_current(&self, attempt: u64) -> bool {
        self.state.lock().await.attempt == attempt
    }

    /// Clear the in-progress flag and release the waiters registered so far,
    /// oldest first. A detached attempt settles nobody.
    async fn settle(&self, attempt: u64, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock().await;
            if state.attempt != attempt {
                return 0;
            }
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
        count
    }

    async fn refresh(&self) -> RefreshOutcome {
        let generation = self.store.generation();
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .ok_or(ExpiryReason::MissingRefreshToken)?;

        let request = HttpRequest::new(HttpMethod::Post, &self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .map_err(|e| ExpiryReason::RefreshUnavailable(e.to_string()))?
            .timeout(self.refresh_timeout);

        debug!(url = %self.refresh_url, "Requesting new access token");
        let response = match timeout(self.refresh_timeout, self.http_client.execute(request)).await
        {
            Err(_) => return Err(ExpiryReason::RefreshTimedOut),
            Ok(Err(e)) => return Err(ExpiryReason::RefreshUnavailable(e.to_string())),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return Err(ExpiryReason::RefreshRejected {
                status: response.status,
            });
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|e| ExpiryReason::MalformedResponse(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(ExpiryReason::MalformedResponse(
                "empty access_token".to_string(),
            ));
        }

        let attributes = SessionAttributes::new(body.name, body.role);
        let written = self
            .store
            .write_refreshed(
                generation,
                &body.access_token,
                body.refresh_token.as_deref(),
                &attributes,
            )
            .await
            .map_err(|e| ExpiryReason::StorageUnavailable(e.to_string()))?;

        if written {
            Ok(body.access_token)
        } else {
            Err(ExpiryReason::LoggedOut)
        }
    }
}
