use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, AppError>;

/// Platform-neutral failure categories. Transports map these to their own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotVisible,
    PermissionDenied,
    Conflict,
    Precondition,
    Unauthenticated,
    Dependency,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("key management error: {0}")]
    Kms(String),

    #[error("{0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::BadRequest(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotVisible,
            AppError::Forbidden(_) => ErrorKind::PermissionDenied,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::FailedPrecondition(_) => ErrorKind::Precondition,
            AppError::Unauthorized(_) => ErrorKind::Unauthenticated,
            AppError::Kms(_)
            | AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Json(_) => ErrorKind::Dependency,
        }
    }

    /// True when the store rejected a write because of a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
            }
            _ => false,
        }
    }

    /// Re-classify a uniqueness violation as `Conflict`; any other error passes through.
    pub fn or_conflict(self, message: impl Into<String>) -> AppError {
        if self.is_unique_violation() {
            AppError::Conflict(message.into())
        } else {
            self
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotVisible => StatusCode::NOT_FOUND,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Precondition => StatusCode::PRECONDITION_FAILED,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.kind() {
            ErrorKind::Dependency => {
                tracing::error!("Internal error: {}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Error wrapper for the trusted internal surface: dependency failures keep their detail.
#[derive(Debug)]
pub struct InternalError(pub AppError);

impl From<AppError> for InternalError {
    fn from(err: AppError) -> Self {
        InternalError(err)
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!("Internal surface error: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
