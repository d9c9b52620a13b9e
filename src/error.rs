use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for the session layer
#[derive(Debug, thiserror::Error)]
pub enum TidegateError {
    /// Another holder currently owns the refresh lease for this session.
    #[error("lock: not obtained")]
    LockNotObtained,

    /// Release or refresh was attempted on a lease the caller does not hold.
    #[error("tried to release not existing lock")]
    NotLocked,

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Session encryption error: {0}")]
    Crypto(String),

    #[error("Session refresh failed: {0}")]
    Refresh(String),

    #[error("session is expired")]
    Expired,

    #[error("session is invalid")]
    Invalid,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_id: String,
}

impl TidegateError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::Refresh(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is the distinguished lock contention condition.
    ///
    /// Callers on the refresh path use this to decide between polling for a
    /// concurrently refreshed session and failing outright.
    pub fn is_lock_not_obtained(&self) -> bool {
        matches!(self, Self::LockNotObtained)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::Expired | Self::Invalid => StatusCode::UNAUTHORIZED,
            Self::LockNotObtained => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotLocked
            | Self::Store(_)
            | Self::Crypto(_)
            | Self::Refresh(_)
            | Self::Internal(_)
            | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a message safe to hand to clients.
    ///
    /// Server-side failures never leak their details (CWE-209); they are
    /// logged in full by `into_response` instead.
    fn safe_message(&self) -> String {
        match self {
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Expired | Self::Invalid => "Unauthorized: session is no longer valid".to_string(),
            Self::LockNotObtained => "Service unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for TidegateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, TidegateError>;

impl From<serde_json::Error> for TidegateError {
    fn from(err: serde_json::Error) -> Self {
        TidegateError::Store(format!("session serialization error: {}", err))
    }
}
