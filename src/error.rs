use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::views;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An object storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// A container management request failed.
    #[error("Container admin error: {0}")]
    ContainerAdmin(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A resource not found error.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// A page template failed to render.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error means the named blob does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::Storage(object_store::Error::NotFound { .. })
        )
    }
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Storage(object_store::Error::NotFound { ref path, .. }) => {
                tracing::debug!("Blob not found: {}", path);
                StatusCode::NOT_FOUND
            }

            AppError::Storage(ref e) => {
                tracing::error!("Storage error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::ContainerAdmin(ref msg) => {
                tracing::error!("Container admin error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::NotFound(ref what) => {
                tracing::debug!("Resource not found: {}", what);
                StatusCode::NOT_FOUND
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                StatusCode::BAD_REQUEST
            }

            AppError::Multipart(ref msg) => {
                tracing::warn!("Multipart error: {}", msg);
                StatusCode::BAD_REQUEST
            }

            AppError::Template(ref e) => {
                tracing::error!("Template error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // The generic error view never carries the failure detail.
        (status, Html(views::error_page())).into_response()
    }
}
