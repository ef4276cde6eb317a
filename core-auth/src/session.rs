//! Session Failure Handler
//!
//! Runs when a session cannot be renewed: purges the credentials, sends the
//! user to the login route and announces the expiry on the event bus.
//!
//! The handler may be invoked concurrently and repeatedly. The store is
//! cleared on every call; the redirect and the event happen once per session
//! and are re-armed by [`SessionFailureHandler::mark_authenticated`] after the
//! next login.

use crate::credential_store::CredentialStore;
use crate::types::ExpiryReason;
use bridge_traits::Navigator;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct SessionFailureHandler {
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    event_bus: EventBus,
    login_route: String,
    ended: AtomicBool,
}

impl SessionFailureHandler {
    pub fn new(
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
        event_bus: EventBus,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            event_bus,
            login_route: login_route.into(),
            ended: AtomicBool::new(false),
        }
    }

    /// End the session.
    ///
    /// Returns `true` for the call that performed the redirect.
    #[instrument(skip(self), fields(reason = %reason))]
    pub async fn handle(&self, reason: &ExpiryReason) -> bool {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to purge credentials on session expiry");
        }

        if self.ended.swap(true, Ordering::SeqCst) {
            debug!("Session already ended, skipping redirect");
            return false;
        }

        info!(route = %self.login_route, "Session expired, redirecting to login");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionExpired {
                reason: reason.to_string(),
            }));

        if let Err(e) = self.navigator.navigate(&self.login_route).await {
            warn!(error = %e, "Login redirect failed");
        }

        true
    }

    /// Re-arm after a successful login.
    pub fn mark_authenticated(&self) {
        self.ended.store(false, Ordering::SeqCst);
    }

    /// Disarm without redirecting, for an explicit logout that navigates on
    /// its own.
    pub fn mark_logged_out(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}
