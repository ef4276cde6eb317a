//! # Authentication Manager
//!
//! Wires the session components together and exposes the user-facing
//! operations: login, logout and session checks.
//!
//! ## Overview
//!
//! One `AuthManager` owns one credential store, one refresh coordinator, one
//! session failure handler and the [`AuthenticatedClient`] built on them. Two
//! managers never share refresh state, so tests and multi-tenant hosts can
//! run independent sessions side by side.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::AuthManager;
//! use core_runtime::config::CoreConfig;
//! use core_runtime::events::EventBus;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::from_env().build()?;
//! let manager = AuthManager::new(&config, EventBus::new(config.event_buffer_size));
//!
//! let session = manager.login("dana", "hunter2").await?;
//! println!("Signed in as {} ({})", session.name, session.role);
//!
//! let client = manager.client();
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

use crate::client::AuthenticatedClient;
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::guard::RouteGuard;
use crate::refresh::RefreshCoordinator;
use crate::session::SessionFailureHandler;
use crate::types::{
    error_detail, AuthState, CredentialPair, LoginRequest, LoginResponse, SessionAttributes,
};
use bridge_traits::http::{HttpMethod, HttpRequest};
use bridge_traits::Navigator;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct AuthManager {
    store: CredentialStore,
    coordinator: RefreshCoordinator,
    failure_handler: Arc<SessionFailureHandler>,
    client: AuthenticatedClient,
    guard: RouteGuard,
    navigator: Arc<dyn Navigator>,
    event_bus: EventBus,
    login_url: String,
    login_route: String,
    home_route: String,
}

impl AuthManager {
    /// Build the session stack from `config`.
    pub fn new(config: &CoreConfig, event_bus: EventBus) -> Self {
        let store = CredentialStore::new(Arc::clone(&config.secure_store));
        let failure_handler = Arc::new(SessionFailureHandler::new(
            store.clone(),
            Arc::clone(&config.navigator),
            event_bus.clone(),
            config.login_route.clone(),
        ));
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&config.http_client),
            store.clone(),
            Arc::clone(&failure_handler),
            event_bus.clone(),
            config.endpoint(&config.refresh_path),
            config.refresh_timeout,
        );
        let client = AuthenticatedClient::new(
            Arc::clone(&config.http_client),
            store.clone(),
            coordinator.clone(),
            event_bus.clone(),
            config
                .public_endpoints
                .iter()
                .chain(std::iter::once(&config.login_path))
                .map(|p| config.endpoint(p)),
            &config.endpoint(&config.refresh_path),
        )
        .with_request_timeout(config.request_timeout);
        let guard = RouteGuard::new(
            store.clone(),
            config.public_routes.iter().cloned(),
            config.login_route.clone(),
        );

        Self {
            store,
            coordinator,
            failure_handler,
            client,
            guard,
            navigator: Arc::clone(&config.navigator),
            event_bus,
            login_url: config.endpoint(&config.login_path),
            login_route: config.login_route.clone(),
            home_route: config.home_route.clone(),
        }
    }

    /// The authenticated client for backend calls.
    pub fn client(&self) -> AuthenticatedClient {
        self.client.clone()
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Sign in with a username and password.
    ///
    /// On success the session is stored, the failure handler re-armed and
    /// the host navigated to the home route.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`] for empty credentials
    /// - [`AuthError::LoginFailed`] when the backend rejects the login
    /// - [`AuthError::InvalidResponse`] for a 2xx body without the expected fields
    /// - [`AuthError::Network`] on transport failure
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionAttributes> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidRequest(
                "username and password are required".to_string(),
            ));
        }

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            username: username.to_string(),
        }));

        let request = HttpRequest::new(HttpMethod::Post, &self.login_url)
            .json(&LoginRequest { username, password })?;
        let response = match self.client.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.emit_error(&e);
                return Err(e);
            }
        };

        if !response.is_success() {
            let e = AuthError::LoginFailed {
                status: response.status,
                detail: error_detail(&response),
            };
            warn!(status = response.status, "Login rejected");
            self.emit_error(&e);
            return Err(e);
        }

        let body: LoginResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if body.access_token.is_empty() || body.refresh_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "login response is missing a token".to_string(),
            ));
        }

        let attributes = SessionAttributes::new(body.name, body.role);
        self.store
            .write(
                &CredentialPair::new(body.access_token, body.refresh_token),
                &attributes,
            )
            .await?;
        self.failure_handler.mark_authenticated();

        info!(name = %attributes.name, role = %attributes.role, "Signed in");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            name: attributes.name.clone(),
            role: attributes.role.clone(),
        }));

        if let Err(e) = self.navigator.navigate(&self.home_route).await {
            warn!(error = %e, "Navigation after login failed");
        }

        Ok(attributes)
    }

    /// End the session on the user's request.
    ///
    /// Requests waiting on a refresh fail with `SessionExpired`; a refresh
    /// still in flight cannot restore the session.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.failure_handler.mark_logged_out();
        let cleared = self.store.clear().await;
        self.coordinator.reject_pending().await;

        info!("Signed out");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));

        if let Err(e) = self.navigator.navigate(&self.login_route).await {
            warn!(error = %e, "Navigation after logout failed");
        }

        cleared
    }

    /// Resolve the session state, renewing the access token when only the
    /// refresh token survived.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> AuthState {
        if self.store.access_token().await.is_some() {
            self.failure_handler.mark_authenticated();
            return AuthState::Authenticated;
        }

        if self.store.refresh_token().await.is_none() {
            return AuthState::LoggedOut;
        }

        self.failure_handler.mark_authenticated();
        match self.coordinator.ensure_fresh_credential().await {
            Ok(_) => AuthState::Authenticated,
            Err(_) => AuthState::LoggedOut,
        }
    }

    /// Current state without side effects.
    pub async fn state(&self) -> AuthState {
        if self.coordinator.is_refreshing().await {
            AuthState::RefreshPending
        } else if self.store.access_token().await.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::LoggedOut
        }
    }

    pub async fn current_session(&self) -> Option<SessionAttributes> {
        if self.store.access_token().await.is_none() {
            return None;
        }
        self.store.attributes().await
    }

    fn emit_error(&self, err: &AuthError) {
        error!(error = %err, "Authentication error");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: err.to_string(),
            recoverable: !err.is_session_expired(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::SessionSecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpResponse};
    use bridge_traits::SecureStore;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn navigate(&self, route: &str) -> BridgeResult<()> {
            self.routes.lock().unwrap().push(route.to_string());
            Ok(())
        }
    }

    fn manager(http: MockHttpClient) -> (AuthManager, Arc<RecordingNavigator>, EventBus) {
        manager_with_store(http, Arc::new(SessionSecureStore::new()))
    }

    fn manager_with_store(
        http: MockHttpClient,
        secure_store: Arc<SessionSecureStore>,
    ) -> (AuthManager, Arc<RecordingNavigator>, EventBus) {
        let navigator = Arc::new(RecordingNavigator::default());
        let config = CoreConfig::builder()
            .http_client(Arc::new(http))
            .secure_store(secure_store)
            .navigator(navigator.clone())
            .build()
            .unwrap();
        let event_bus = EventBus::new(32);
        (AuthManager::new(&config, event_bus.clone()), navigator, event_bus)
    }

    fn login_ok() -> HttpResponse {
        HttpResponse::new(
            200,
            r#"{"access_token":"a-1","refresh_token":"r-1","name":"Dana","role":"admin"}"#,
        )
    }

    #[tokio::test]
    async fn test_login_stores_session_and_navigates_home() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.url == "http://localhost:8000/users/login"
                    && request.bearer().is_none()
                    && request.body.as_deref()
                        == Some(br#"{"username":"dana","password":"pw"}"#.as_slice())
            })
            .times(1)
            .returning(|_| Ok(login_ok()));

        let (manager, navigator, event_bus) = manager(http);
        let mut events = event_bus.subscribe();

        let session = manager.login(" dana ", "pw").await.unwrap();

        assert_eq!(session, SessionAttributes::new("Dana", "admin"));
        assert_eq!(
            manager.credential_store().read().await,
            Some(CredentialPair::new("a-1", "r-1"))
        );
        assert_eq!(manager.state().await, AuthState::Authenticated);
        assert_eq!(*navigator.routes.lock().unwrap(), vec!["/dashboard"]);

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_failure_reports_backend_detail() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"detail":"Incorrect username or password"}"#,
            ))
        });

        let (manager, navigator, _bus) = manager(http);
        let result = manager.login("dana", "wrong").await;

        match result {
            Err(AuthError::LoginFailed { status, detail }) => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Incorrect username or password");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(manager.current_session().await.is_none());
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_empty_credentials() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let (manager, _navigator, _bus) = manager(http);

        assert!(matches!(
            manager.login("  ", "pw").await,
            Err(AuthError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_login_with_malformed_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"a-1"}"#)));

        let (manager, _navigator, _bus) = manager(http);

        assert!(matches!(
            manager.login("dana", "pw").await,
            Err(AuthError::InvalidResponse(_))
        ));
        assert!(manager.credential_store().read().await.is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_and_navigates() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| Ok(login_ok()));

        let (manager, navigator, _bus) = manager(http);
        manager.login("dana", "pw").await.unwrap();
        manager.logout().await.unwrap();

        assert!(manager.credential_store().read().await.is_none());
        assert!(manager.current_session().await.is_none());
        assert_eq!(manager.state().await, AuthState::LoggedOut);
        assert_eq!(
            *navigator.routes.lock().unwrap(),
            vec!["/dashboard", "/login"]
        );
    }

    #[tokio::test]
    async fn test_check_auth_without_tokens() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let (manager, navigator, _bus) = manager(http);

        assert_eq!(manager.check_auth().await, AuthState::LoggedOut);
        assert!(navigator.routes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_auth_renews_from_refresh_token() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/auth/refresh"))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token":"a-2","name":"Dana","role":"admin"}"#,
                ))
            });

        // Only the refresh token survived a restart.
        let secure_store = Arc::new(SessionSecureStore::new());
        secure_store
            .set_secret(crate::credential_store::REFRESH_TOKEN_KEY, b"r-1")
            .await
            .unwrap();
        let (manager, _navigator, _bus) = manager_with_store(http, secure_store);

        assert_eq!(manager.check_auth().await, AuthState::Authenticated);
        assert_eq!(
            manager.credential_store().access_token().await.as_deref(),
            Some("a-2")
        );
    }
}
