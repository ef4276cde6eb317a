//! Integration tests for the authenticated request layer
//!
//! These tests drive the full stack built by `AuthManager` against an
//! in-process backend that issues, expires and renews tokens:
//! - Concurrent 401s share a single refresh call
//! - A rejected refresh ends the session exactly once
//! - A replayed request is never replayed again
//! - Public endpoints are sent without credentials
//! - Logout during a refresh cannot resurrect the session

use async_trait::async_trait;
use bridge_desktop::SessionSecureStore;
use bridge_traits::{
    error::Result as BridgeResult, HttpClient, HttpMethod, HttpRequest, HttpResponse, Navigator,
};
use core_auth::{AuthError, AuthManager, AuthState, RouteDecision};
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const BASE: &str = "http://localhost:8000";

// ============================================================================
// Fake backend
// ============================================================================

/// Backend double: one valid access token at a time, one valid refresh token.
struct FakeBackend {
    access_token: Mutex<String>,
    refresh_token: Mutex<String>,
    refresh_calls: AtomicUsize,
    /// Refresh calls wait for this before answering when set.
    refresh_gate: Mutex<Option<Arc<Notify>>>,
    /// Protected endpoints answer 401 regardless of the credential.
    reject_all: AtomicBool,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            access_token: Mutex::new("access-0".to_string()),
            refresh_token: Mutex::new("refresh-0".to_string()),
            refresh_calls: AtomicUsize::new(0),
            refresh_gate: Mutex::new(None),
            reject_all: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Invalidate the current access token, as if it had expired.
    fn expire_access_token(&self) {
        *self.access_token.lock().unwrap() = "expired".to_string();
    }

    fn revoke_refresh_token(&self) {
        *self.refresh_token.lock().unwrap() = "revoked".to_string();
    }

    fn hold_refreshes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.refresh_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .cloned()
            .collect()
    }

    fn body(request: &HttpRequest) -> Value {
        request
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(Value::Null)
    }

    fn respond(status: u16, body: Value) -> HttpResponse {
        HttpResponse::new(status, body.to_string())
    }

    async fn refresh(&self, request: &HttpRequest) -> HttpResponse {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let presented = Self::body(request)["refresh_token"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if presented != *self.refresh_token.lock().unwrap() {
            return Self::respond(401, json!({ "detail": "Invalid refresh token" }));
        }

        let access_token = format!("access-{}", call);
        *self.access_token.lock().unwrap() = access_token.clone();
        Self::respond(
            200,
            json!({ "access_token": access_token, "name": "Dana", "role": "admin" }),
        )
    }

    fn login(&self, request: &HttpRequest) -> HttpResponse {
        let body = Self::body(request);
        if body["username"] != "dana" || body["password"] != "pw" {
            return Self::respond(401, json!({ "detail": "Incorrect username or password" }));
        }
        Self::respond(
            200,
            json!({
                "access_token": self.access_token.lock().unwrap().clone(),
                "refresh_token": self.refresh_token.lock().unwrap().clone(),
                "name": "Dana",
                "role": "admin",
            }),
        )
    }

    fn protected(&self, request: &HttpRequest) -> HttpResponse {
        let valid = request.bearer() == Some(self.access_token.lock().unwrap().as_str());
        if valid && !self.reject_all.load(Ordering::SeqCst) {
            Self::respond(200, json!({ "url": request.url }))
        } else {
            Self::respond(401, json!({ "detail": "Could not validate credentials" }))
        }
    }
}

/// Shares one backend between the config and the test body.
struct BackendHandle(Arc<FakeBackend>);

#[async_trait]
impl HttpClient for BackendHandle {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.0.requests.lock().unwrap().push(request.clone());
        let response = if request.url.ends_with("/auth/refresh") {
            self.0.refresh(&request).await
        } else if request.url.ends_with("/users/login") {
            self.0.login(&request)
        } else {
            self.0.protected(&request)
        };
        Ok(response)
    }
}

#[derive(Default)]
struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, route: &str) -> BridgeResult<()> {
        self.routes.lock().unwrap().push(route.to_string());
        Ok(())
    }
}

struct Harness {
    manager: Arc<AuthManager>,
    backend: Arc<FakeBackend>,
    navigator: Arc<RecordingNavigator>,
    event_bus: EventBus,
}

impl Harness {
    fn new() -> Self {
        Self::with_base_url(BASE)
    }

    fn with_base_url(base_url: &str) -> Self {
        let backend = FakeBackend::new();
        let navigator = Arc::new(RecordingNavigator::default());
        let config = CoreConfig::builder()
            .api_base_url(base_url)
            .http_client(Arc::new(BackendHandle(Arc::clone(&backend))))
            .secure_store(Arc::new(SessionSecureStore::new()))
            .navigator(navigator.clone())
            .refresh_timeout(Duration::from_secs(5))
            .build()
            .expect("config");
        let event_bus = EventBus::new(64);
        let manager = Arc::new(AuthManager::new(&config, event_bus.clone()));
        Self {
            manager,
            backend,
            navigator,
            event_bus,
        }
    }

    async fn signed_in() -> Self {
        let harness = Self::new();
        harness.manager.login("dana", "pw").await.expect("login");
        harness
    }

    fn get(path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, format!("{}{}", BASE, path))
    }

    /// Wait until `count` requests carrying `token` reached the backend.
    async fn wait_for_requests_with(&self, token: &str, count: usize) {
        loop {
            let sent = self
                .backend
                .requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.bearer() == Some(token))
                .count();
            if sent >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_valid_token_needs_no_refresh() {
    let harness = Harness::signed_in().await;

    let response = harness
        .manager
        .client()
        .send(Harness::get("/products"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(harness.backend.refresh_calls(), 0);
    assert_eq!(
        harness.backend.requests_to("/products")[0].bearer(),
        Some("access-0")
    );
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let harness = Harness::signed_in().await;
    harness.backend.expire_access_token();
    let gate = harness.backend.hold_refreshes();

    let client = harness.manager.client();
    let handles: Vec<_> = ["/sales", "/products", "/customers", "/users", "/reports"]
        .into_iter()
        .map(|path| {
            let client = client.clone();
            tokio::spawn(async move { client.send(Harness::get(path)).await })
        })
        .collect();

    harness.wait_for_requests_with("access-0", 5).await;
    while !harness.manager.coordinator().is_refreshing().await {
        tokio::task::yield_now().await;
    }
    gate.notify_one();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    assert_eq!(harness.backend.refresh_calls(), 1);
    assert_eq!(
        harness.manager.credential_store().access_token().await.as_deref(),
        Some("access-1")
    );
    for path in ["/sales", "/products", "/customers", "/users", "/reports"] {
        let sent = harness.backend.requests_to(path);
        assert_eq!(sent.len(), 2, "{} should be sent twice", path);
        assert_eq!(sent[1].bearer(), Some("access-1"));
    }
}

#[tokio::test]
async fn test_revoked_refresh_token_ends_session_once() {
    let harness = Harness::signed_in().await;
    harness.backend.expire_access_token();
    harness.backend.revoke_refresh_token();
    let mut events = harness.event_bus.subscribe();

    let client = harness.manager.client();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.send(Harness::get(&format!("/sales/{}", i))).await })
        })
        .collect();

    for handle in handles {
        assert!(matches!(
            handle.await.unwrap(),
            Err(AuthError::SessionExpired)
        ));
    }

    assert!(harness.manager.credential_store().read().await.is_none());
    assert!(harness.manager.current_session().await.is_none());
    assert_eq!(harness.navigator.routes(), vec!["/dashboard", "/login"]);
    assert_eq!(harness.manager.state().await, AuthState::LoggedOut);

    let mut expired = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::Auth(AuthEvent::SessionExpired { .. })) {
            expired += 1;
        }
    }
    assert_eq!(expired, 1);
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let harness = Harness::signed_in().await;
    harness.backend.expire_access_token();
    harness.backend.reject_all.store(true, Ordering::SeqCst);

    let response = harness
        .manager
        .client()
        .send(Harness::get("/users"))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(harness.backend.requests_to("/users").len(), 2);
    assert_eq!(harness.backend.refresh_calls(), 1);
    // A permission failure after a successful refresh keeps the session.
    assert!(harness.manager.credential_store().read().await.is_some());
}

#[tokio::test]
async fn test_public_endpoints_carry_no_credential() {
    let harness = Harness::signed_in().await;

    let request = HttpRequest::new(HttpMethod::Post, format!("{}/auth/register", BASE))
        .bearer_token("caller-supplied");
    harness.manager.client().send(request).await.unwrap();

    let login = &harness.backend.requests_to("/users/login")[0];
    assert!(login.bearer().is_none());
    let register = &harness.backend.requests_to("/auth/register")[0];
    assert!(register.bearer().is_none());
    assert_eq!(harness.backend.refresh_calls(), 0);
}

const PREFIXED_BASE: &str = "http://localhost:8000/api";

#[tokio::test]
async fn test_wrong_password_under_prefixed_base_url() {
    let harness = Harness::with_base_url(PREFIXED_BASE);

    let result = harness.manager.login("dana", "wrong").await;

    assert!(matches!(result, Err(AuthError::LoginFailed { .. })));
    let logins = harness.backend.requests_to("/users/login");
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].url, "http://localhost:8000/api/users/login");
    assert_eq!(harness.backend.refresh_calls(), 0);
    assert!(harness.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_prefixed_base_url_public_and_refresh_paths() {
    let harness = Harness::with_base_url(PREFIXED_BASE);
    harness.manager.login("dana", "pw").await.expect("login");
    assert!(harness.backend.requests_to("/users/login")[0].bearer().is_none());

    let register = HttpRequest::new(HttpMethod::Post, format!("{}/auth/register", PREFIXED_BASE))
        .bearer_token("caller-supplied");
    let response = harness.manager.client().send(register).await.unwrap();
    assert_eq!(response.status, 401);
    assert!(harness.backend.requests_to("/auth/register")[0].bearer().is_none());
    assert_eq!(harness.backend.refresh_calls(), 0);

    harness.backend.expire_access_token();
    let response = harness
        .manager
        .client()
        .send(HttpRequest::new(HttpMethod::Get, format!("{}/sales", PREFIXED_BASE)))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let refreshes = harness.backend.requests_to("/auth/refresh");
    assert_eq!(refreshes.len(), 1);
    assert_eq!(refreshes[0].url, "http://localhost:8000/api/auth/refresh");
    assert!(refreshes[0].bearer().is_none());
    assert_eq!(harness.manager.state().await, AuthState::Authenticated);
}

#[tokio::test]
async fn test_logout_during_refresh_keeps_session_ended() {
    let harness = Harness::signed_in().await;
    harness.backend.expire_access_token();
    let gate = harness.backend.hold_refreshes();

    let client = harness.manager.client();
    let pending = tokio::spawn(async move { client.send(Harness::get("/sales")).await });

    while !harness.manager.coordinator().is_refreshing().await {
        tokio::task::yield_now().await;
    }
    harness.manager.logout().await.unwrap();
    gate.notify_one();

    assert!(matches!(
        pending.await.unwrap(),
        Err(AuthError::SessionExpired)
    ));
    while harness.manager.coordinator().is_refreshing().await {
        tokio::task::yield_now().await;
    }
    assert!(harness.manager.credential_store().access_token().await.is_none());
    assert_eq!(harness.navigator.routes(), vec!["/dashboard", "/login"]);
}

#[tokio::test]
async fn test_login_after_expiry_rearms_redirect() {
    let harness = Harness::signed_in().await;
    harness.backend.expire_access_token();
    harness.backend.revoke_refresh_token();

    let client = harness.manager.client();
    assert!(client.send(Harness::get("/sales")).await.is_err());

    *harness.backend.access_token.lock().unwrap() = "access-9".to_string();
    *harness.backend.refresh_token.lock().unwrap() = "refresh-9".to_string();
    harness.manager.login("dana", "pw").await.unwrap();
    harness.backend.expire_access_token();
    harness.backend.revoke_refresh_token();
    assert!(client.send(Harness::get("/sales")).await.is_err());

    assert_eq!(
        harness.navigator.routes(),
        vec!["/dashboard", "/login", "/dashboard", "/login"]
    );
}

#[tokio::test]
async fn test_wrong_password_is_login_failure() {
    let harness = Harness::new();

    let result = harness.manager.login("dana", "nope").await;

    assert!(matches!(
        result,
        Err(AuthError::LoginFailed { status: 401, ref detail }) if detail == "Incorrect username or password"
    ));
    assert_eq!(harness.manager.check_auth().await, AuthState::LoggedOut);
}

#[tokio::test]
async fn test_guard_redirects_until_signed_in() {
    let harness = Harness::new();
    let guard = harness.manager.guard().clone();

    assert_eq!(
        guard.check("/dashboard").await,
        RouteDecision::RedirectToLogin("/login".to_string())
    );

    harness.manager.login("dana", "pw").await.unwrap();
    assert_eq!(guard.check("/dashboard").await, RouteDecision::Allow);
}
