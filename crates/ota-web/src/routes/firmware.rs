//! Device-facing firmware routes.
//!
//! # Endpoints
//!
//! ### `GET /version`
//! Returns the current firmware version as `text/plain`, or `0.0.0` when
//! nothing has been published.
//!
//! ### `GET /firmware.bin`
//! Returns the current firmware image as `application/octet-stream`.
//! Responds `404 Not Found` when nothing has been published.
//!
//! Devices typically poll `/version`, compare it with their own build tag
//! and download `/firmware.bin` when it differs. Both handlers read from the
//! store's in-memory snapshot and never wait on an in-flight upload.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::{ApiError, AppState};

/// File name suggested to clients saving the download.
const DOWNLOAD_NAME: &str = "firmware.bin";

/// Create device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/version", get(get_version))
        .route("/firmware.bin", get(get_firmware))
}

/// GET /version
async fn get_version(State(state): State<AppState>) -> String {
    state.store.current_version().to_string()
}

/// GET /firmware.bin
async fn get_firmware(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let payload = state.store.current_binary()?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        payload,
    ))
}
