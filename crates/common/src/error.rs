//! Error types for fediwire.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not our IRI: {0}")]
    NotOurs(String),

    #[error("Invalid collection: {0}")]
    InvalidCollection(String),

    #[error("Activity requires a local actor: {0}")]
    ActorRequired(String),

    #[error("Activity requires an object")]
    ObjectRequired,

    #[error("Object requires an id")]
    IdRequired,

    #[error("Object requires a type")]
    TypeRequired,

    #[error("Unhandled type: {0}")]
    UnhandledType(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Signature rejected: {0}")]
    Signature(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Delivery failed to {} recipient(s): {reason}", .recipients.len())]
    Delivery {
        /// Every recipient inbox the delivery failed for.
        recipients: Vec<String>,
        /// Transport-level reason for the first failure.
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::NotOurs(_) => StatusCode::NOT_FOUND,
            Self::InvalidCollection(_)
            | Self::ActorRequired(_)
            | Self::ObjectRequired
            | Self::IdRequired
            | Self::TypeRequired
            | Self::UnhandledType(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Signature(_) => StatusCode::UNAUTHORIZED,

            // 5xx Server Errors
            Self::Delivery { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotOurs(_) => "NOT_OURS",
            Self::InvalidCollection(_) => "INVALID_COLLECTION",
            Self::ActorRequired(_) => "ACTOR_REQUIRED",
            Self::ObjectRequired => "OBJECT_REQUIRED",
            Self::IdRequired => "ID_REQUIRED",
            Self::TypeRequired => "TYPE_REQUIRED",
            Self::UnhandledType(_) => "UNHANDLED_TYPE",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Signature(_) => "SIGNATURE_REJECTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Delivery { .. } => "DELIVERY_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// The recipients a failed delivery should be retried for.
    ///
    /// Empty for every other error kind.
    #[must_use]
    pub fn failed_recipients(&self) -> &[String] {
        match self {
            Self::Delivery { recipients, .. } => recipients,
            _ => &[],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Server-side detail is logged here and never echoed to the client.
        let message = if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        Self::BadRequest(format!("Invalid IRI: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(
            AppError::NotOurs("https://other.example/users/bob".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::TypeRequired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnhandledType("Widget".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_delivery_error_carries_recipients() {
        let err = AppError::Delivery {
            recipients: vec!["https://remote.example/inbox".into()],
            reason: "timeout".into(),
        };
        assert_eq!(err.failed_recipients().len(), 1);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("1 recipient"));
    }

    #[test]
    fn test_database_detail_is_server_error() {
        let err = AppError::Database("connection refused".into());
        assert!(err.is_server_error());
    }
}
