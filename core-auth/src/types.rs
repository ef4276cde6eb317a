use bridge_traits::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access and refresh tokens issued together at login.
///
/// Tokens are opaque strings; nothing here inspects their contents.
///
/// # Examples
///
/// ```
/// use core_auth::CredentialPair;
///
/// let pair = CredentialPair::new("a-123", "r-456");
/// assert_eq!(pair.access_token(), "a-123");
/// assert!(!format!("{:?}", pair).contains("r-456"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access_token: String,
    refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

// Never print token values.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Descriptive fields stored next to the credentials; they expire with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttributes {
    /// Display name
    pub name: String,
    pub role: String,
}

impl SessionAttributes {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// A request travelling through the authenticated client.
///
/// The descriptor is immutable: the replay after a refresh is a new value
/// produced by [`PendingRequest::into_retry`], so a request can be replayed
/// at most once.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    request: HttpRequest,
    retried: bool,
}

impl PendingRequest {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Whether this descriptor is already the single allowed replay.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// The replay descriptor, carrying the same request.
    pub fn into_retry(self) -> Self {
        Self {
            request: self.request,
            retried: true,
        }
    }

    /// The request to put on the wire, with `token` as bearer credential or
    /// with any stale credential removed when there is none.
    pub fn authorized(&self, token: Option<&str>) -> HttpRequest {
        let request = self.request.clone();
        match token {
            Some(token) => request.bearer_token(token),
            None => request.without_header(bridge_traits::http::AUTHORIZATION),
        }
    }
}

/// Coarse authentication state.
///
/// ```text
/// Authenticated --401--> RefreshPending --ok--> Authenticated
///                              |
///                              +--fail / no refresh token--> LoggedOut
/// Authenticated --logout--> LoggedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthState {
    Authenticated,
    RefreshPending,
    #[default]
    LoggedOut,
}

impl AuthState {
    /// `RefreshPending` counts as authenticated: requests are held, not failed.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::RefreshPending)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::RefreshPending => write!(f, "refresh pending"),
            AuthState::LoggedOut => write!(f, "logged out"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryReason {
    /// No refresh token was stored.
    MissingRefreshToken,
    /// The refresh endpoint answered with a non-2xx status.
    RefreshRejected { status: u16 },
    /// The refresh call failed on the wire.
    RefreshUnavailable(String),
    /// The refresh call exceeded the configured timeout.
    RefreshTimedOut,
    /// The refresh endpoint answered 2xx with an unusable body.
    MalformedResponse(String),
    /// The new credential could not be persisted.
    StorageUnavailable(String),
    /// The user logged out while the request was pending.
    LoggedOut,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryReason::MissingRefreshToken => write!(f, "no refresh token"),
            ExpiryReason::RefreshRejected { status } => {
                write!(f, "refresh rejected with status {}", status)
            }
            ExpiryReason::RefreshUnavailable(e) => write!(f, "refresh request failed: {}", e),
            ExpiryReason::RefreshTimedOut => write!(f, "refresh timed out"),
            ExpiryReason::MalformedResponse(e) => write!(f, "malformed refresh response: {}", e),
            ExpiryReason::StorageUnavailable(e) => write!(f, "credential storage failed: {}", e),
            ExpiryReason::LoggedOut => write!(f, "logged out"),
        }
    }
}

// ============================================================================
// Wire formats
// ============================================================================

/// `POST /users/login` body.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `POST /users/login` success body.
#[derive(Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub name: String,
    pub role: String,
}

/// `POST /auth/refresh` body.
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `POST /auth/refresh` success body.
///
/// `refresh_token` is only present when the backend rotates it.
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Human-readable failure text for a non-2xx response.
///
/// Uses the backend's `detail` field when present (a string, or a validation
/// error list rendered as JSON), otherwise `HTTP error: <status>`.
pub fn error_detail(response: &HttpResponse) -> String {
    match response.json::<ErrorBody>() {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) if !detail.is_null() => detail.to_string(),
        _ => format!("HTTP error: {}", response.status),
    }
}
