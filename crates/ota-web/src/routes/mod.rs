//! HTTP route handlers for the OTA server.
//!
//! Routes are split by audience:
//! - [`firmware`] - polled by devices (`/version`, `/firmware.bin`)
//! - [`upload`] - used by operators (`/upload`)

pub mod firmware;
pub mod upload;

use crate::AppState;
use axum::{extract::DefaultBodyLimit, Router};

/// Create the main Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.upload.max_upload_bytes;

    Router::new()
        .merge(firmware::routes())
        .merge(upload::routes())
        // Firmware images routinely exceed Axum's 2 MiB default.
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
