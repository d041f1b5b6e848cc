//! Backend Error Types
//!
//! The error taxonomy used across REST handlers and the realtime layer.
//! Access and not-found checks are local and fail fast; persistence failures
//! surface here and, inside the drag-and-drop reconciler, additionally force
//! a `task:move_failed` correction broadcast.

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::store::StoreError;

/// All the ways a Flowboard operation can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential, or one that failed verification.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Valid credential, but the user is not a member of the owning project.
    #[error("{0}")]
    AccessDenied(String),

    /// A referenced project/board/task/collection does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Malformed payload (missing move fields, mismatched board/project,
    /// duplicate task id across columns).
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation, e.g. a duplicate collection name in a project.
    #[error("{0}")]
    Conflict(String),

    /// The persistence gateway failed a read or write.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl ApiError {
    pub fn access_denied(what: &str) -> Self {
        ApiError::AccessDenied(format!("Access denied to this {}", what))
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    /// The HTTP status class for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::Backend(message) => ApiError::Persistence(message),
        }
    }
}
