//! Route guard: keeps unauthenticated users on public routes.

use crate::credential_store::CredentialStore;
use tracing::debug;

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Send the user to the contained route instead.
    RedirectToLogin(String),
}

#[derive(Clone)]
pub struct RouteGuard {
    store: CredentialStore,
    public_routes: Vec<String>,
    login_route: String,
}

impl RouteGuard {
    pub fn new(
        store: CredentialStore,
        public_routes: impl IntoIterator<Item = String>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            store,
            public_routes: public_routes.into_iter().collect(),
            login_route: login_route.into(),
        }
    }

    /// Decide whether `path` may be shown.
    ///
    /// Public routes (and their sub-routes) are always allowed. Anything else
    /// requires a stored access token; an expired one is let through and
    /// renewed by the client on the first 401.
    pub async fn check(&self, path: &str) -> RouteDecision {
        if self.is_public(path) {
            return RouteDecision::Allow;
        }

        if self.store.access_token().await.is_some() {
            RouteDecision::Allow
        } else {
            debug!(path = path, "No session, redirecting to login");
            RouteDecision::RedirectToLogin(self.login_route.clone())
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = path.trim_end_matches('/');
        self.public_routes.iter().any(|route| {
            let route = route.trim_end_matches('/');
            path == route
                || path
                    .strip_prefix(route)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}
