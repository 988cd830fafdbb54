//! # ota-web
//!
//! HTTP surface of the OTA firmware server.
//!
//! This crate provides:
//! - Device endpoints for polling the current version and downloading the image
//! - The operator upload endpoint that publishes a new image
//! - Plain-text error responses for every rejection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ota_core::FileFirmwareStore;
//! use ota_web::{create_router, ServerState, UploadSettings};
//!
//! let store = FileFirmwareStore::open("./firmware")?;
//! let state = ServerState::new(Arc::new(store), UploadSettings::default());
//! let app = create_router(Arc::new(state));
//!
//! let listener = TcpListener::bind("0.0.0.0:80").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod routes;

// Re-exports
pub use error::ApiError;
pub use routes::create_router;

use ota_core::FirmwareStore;
use std::sync::Arc;

/// Default cap on upload request bodies.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Policy applied to operator uploads.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Uploaded file names must end with this suffix.
    pub required_suffix: String,
    /// Maximum request body size accepted on `/upload`.
    pub max_upload_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            required_suffix: ".bin".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared server state for all route handlers.
pub struct ServerState {
    pub store: Arc<dyn FirmwareStore>,
    pub upload: UploadSettings,
}

impl ServerState {
    /// Create new server state.
    pub fn new(store: Arc<dyn FirmwareStore>, upload: UploadSettings) -> Self {
        Self { store, upload }
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;
