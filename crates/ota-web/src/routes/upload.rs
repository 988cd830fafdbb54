//! Operator upload route.
//!
//! # Endpoints
//!
//! ### `POST /upload`
//! Publish a new firmware image.
//!
//! **Request:** `multipart/form-data` with the image in the `file` field.
//! The file name must end in `.bin`.
//!
//! **Response:** `text/plain`
//! ```text
//! Upload OK! Detected firmware version: 1.0.5
//! ```
//!
//! Rejections (`400`) leave the current image untouched:
//! - no `file` part, or an empty one
//! - a file name without the required suffix
//! - a malformed or truncated multipart body
//!
//! The whole file is buffered before anything is published, so a client
//! that disconnects mid-transfer never replaces the current image.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
};
use bytes::Bytes;
use tracing::{info, warn};

use crate::{ApiError, AppState};

/// Multipart field carrying the firmware image.
const FILE_FIELD: &str = "file";

/// Create upload routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload_firmware))
}

/// POST /upload
async fn upload_firmware(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<String, ApiError> {
    let result = receive_and_publish(&state, multipart).await;
    if let Err(e) = &result {
        warn!(error = %e, "Rejected firmware upload");
    }
    result
}

async fn receive_and_publish(state: &AppState, mut multipart: Multipart) -> Result<String, ApiError> {
    let (filename, payload) = read_file_field(&mut multipart, &state.upload.required_suffix).await?;

    if payload.is_empty() {
        return Err(ApiError::NoFileProvided);
    }
    info!(%filename, size = payload.len(), "Received firmware upload");

    // File-backed stores block on disk I/O.
    let store = state.store.clone();
    let version = tokio::task::spawn_blocking(move || store.publish(payload))
        .await
        .map_err(|e| ApiError::PublishFailed(e.to_string()))??;

    Ok(format!("Upload OK! Detected firmware version: {version}"))
}

/// Find the `file` part, check its name, and buffer its content.
///
/// The suffix is checked before the body is read so rejected uploads are
/// not buffered.
async fn read_file_field(
    multipart: &mut Multipart,
    required_suffix: &str,
) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ApiError::NoFileProvided),
        };

        if !filename.ends_with(required_suffix) {
            return Err(ApiError::InvalidExtension {
                filename,
                suffix: required_suffix.to_string(),
            });
        }

        let payload = field.bytes().await?;
        return Ok((filename, payload));
    }

    Err(ApiError::NoFileProvided)
}
