/**
 * Backend Error Types
 *
 * Errors raised on the server side: unknown routes, session lookup,
 * configuration and the stores behind the session validators.
 *
 * The broadcast path has no error type. Delivery failures stay inside the
 * registry and only show up in the delivered count.
 */

use crate::shared::{ConfigError, SharedError};
use axum::http::StatusCode;
use thiserror::Error;

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use homesync::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::not_found("/api/grocery");
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// No route matched the request
    #[error("No route for {path}")]
    RouteNotFound { path: String },

    /// The session validator could not answer
    #[error("Session lookup failed: {message}")]
    SessionUnavailable { message: String },

    /// Invalid or unreadable configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session store query failed
    #[error("Session store error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session token could not be signed or verified
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Envelope could not be encoded or decoded
    #[error(transparent)]
    Envelope(#[from] SharedError),
}

impl BackendError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::RouteNotFound { path: path.into() }
    }

    /// The session collaborator failed (timeout, unreachable store, ...)
    pub fn session(message: impl Into<String>) -> Self {
        Self::SessionUnavailable {
            message: message.into(),
        }
    }

    /// HTTP status for this error
    ///
    /// - `RouteNotFound` - 404
    /// - `SessionUnavailable`, `Database` - 503
    /// - `Token` - 401
    /// - malformed envelope - 400
    /// - everything else - 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::SessionUnavailable { .. } | Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Envelope(e) if e.is_malformed() => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Envelope(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to put in a response body
    ///
    /// Store and configuration details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::RouteNotFound { .. } | Self::Envelope(_) => self.to_string(),
            Self::SessionUnavailable { .. } | Self::Database(_) => {
                "Session service unavailable".to_string()
            }
            Self::Token(_) => "Unauthorized".to_string(),
            Self::Config(_) => "Internal server error".to_string(),
        }
    }
}
