//! Boundary errors for the HTTP layer.
//!
//! Every failure is rendered as a plain-text body with a matching status
//! code. None of them stop the server.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ota_core::StoreError;
use thiserror::Error;

/// Errors returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The upload had no `file` part, or the part was empty.
    #[error("No file uploaded.")]
    NoFileProvided,

    /// The uploaded file name lacks the required suffix.
    #[error("Only {suffix} files are accepted.")]
    InvalidExtension { filename: String, suffix: String },

    /// The multipart body could not be read (malformed, too large, or the
    /// client went away mid-transfer).
    #[error("Invalid upload: {0}")]
    Malformed(#[from] MultipartError),

    /// Nothing has been published yet.
    #[error("No firmware available.")]
    NotFound,

    /// The store could not persist the new image.
    #[error("Failed to publish firmware: {0}")]
    PublishFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFileProvided | ApiError::InvalidExtension { .. } => StatusCode::BAD_REQUEST,
            ApiError::Malformed(e) => e.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::EmptyPayload => ApiError::NoFileProvided,
            StoreError::PublishFailed { source } | StoreError::Io(source) => {
                ApiError::PublishFailed(source.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
