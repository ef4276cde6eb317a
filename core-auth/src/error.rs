use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend still rejected the credential after the single replay.
    #[error("Unauthorized")]
    Unauthorized,

    /// The session could not be renewed. Credentials have been purged and the
    /// login redirect has already happened.
    #[error("Session expired")]
    SessionExpired,

    /// Transport failure, passed through from the HTTP bridge unmodified.
    #[error("Network failure: {0}")]
    Network(#[source] BridgeError),

    #[error("Login failed ({status}): {detail}")]
    LoginFailed { status: u16, detail: String },

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),
}

impl AuthError {
    /// Whether this error ended the session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AuthError::SessionExpired)
    }
}

impl From<BridgeError> for AuthError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::SessionExpired => AuthError::SessionExpired,
            other => AuthError::Network(other),
        }
    }
}

impl From<AuthError> for BridgeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SessionExpired => BridgeError::SessionExpired,
            AuthError::Network(inner) => inner,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
