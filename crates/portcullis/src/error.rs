//! Gate error types.

use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Error type returned by application hooks.
///
/// Hooks are application code, so any error type that can cross threads is accepted.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while configuring or running the gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Configuration could not be loaded or violates a path invariant.
    #[error("invalid gate configuration: {0}")]
    Config(String),

    /// The session store failed to read or write a field.
    #[error("session store error: {0}")]
    Session(String),

    /// The application's login callback failed.
    #[error("login callback failed: {0}")]
    LoginCallback(#[source] HookError),

    /// The application's logout callback failed.
    #[error("logout callback failed: {0}")]
    LogoutCallback(#[source] HookError),
}

impl GateError {
    /// Short machine-readable category used in the JSON error body.
    pub fn category(&self) -> &'static str {
        match self {
            GateError::Config(_) => "configuration",
            GateError::Session(_) => "session",
            GateError::LoginCallback(_) | GateError::LogoutCallback(_) => "authentication",
        }
    }
}

impl From<tower_sessions::session::Error> for GateError {
    fn from(err: tower_sessions::session::Error) -> Self {
        GateError::Session(err.to_string())
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "category": self.category(),
                "message": self.to_string(),
            }
        });

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(http::header::CONTENT_TYPE, "application/json")],
            serde_json::to_string(&body).unwrap_or_default(),
        )
            .into_response()
    }
}
