//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization error
    #[error("Access denied: {0}")]
    Authorization(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict error (e.g., duplicate course code)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Upstream service error (transcoder, streaming provider)
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code plus the short error label and optional detail string
    /// used for the JSON body. Database and token failures keep their
    /// internals out of responses.
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error",
                Some(msg.clone()),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database operation failed",
                None,
            ),
            AppError::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database migration failed",
                None,
            ),
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "Authentication failed", Some(msg.clone()))
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, "Access denied", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation error", Some(msg.clone()))
            }
            AppError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error",
                Some(msg.clone()),
            ),
            AppError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                "Upstream service error",
                Some(msg.clone()),
            ),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO operation failed", None),
            AppError::AddrParse(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid address", None)
            }
            AppError::Json(e) => (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string())),
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Invalid token", None),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                Some(msg.clone()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();

        tracing::error!(error = %self, status = %status, "Request error");

        let body = match details {
            Some(details) => json!({ "error": error, "details": details }),
            None => json!({ "error": error }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_client_errors() {
        let (status, _, _) = AppError::NotFound("video abc".into()).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = AppError::Validation("points must be positive".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = AppError::Authentication("invalid credentials".into()).parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = AppError::Authorization("admin only".into()).parts();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = AppError::Conflict("course code taken".into()).parts();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn database_details_are_not_exposed() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        let (status, error, details) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error, "Database operation failed");
        assert!(details.is_none());
    }

    #[test]
    fn validation_detail_is_preserved() {
        let (_, error, details) = AppError::Validation("missing filename".into()).parts();
        assert_eq!(error, "Validation error");
        assert_eq!(details.as_deref(), Some("missing filename"));
    }
}
