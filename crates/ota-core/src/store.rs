//! Firmware store.
//!
//! The store holds the single "current" firmware image and publishes new
//! ones. Readers always observe a complete (payload, version) pair: each
//! publish builds a fresh immutable [`FirmwareImage`] and swaps it in with a
//! single pointer replacement.

use bytes::Bytes;
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

use crate::model::FirmwareImage;
use crate::version::FirmwareVersion;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Publish was called with zero bytes.
    #[error("Firmware payload is empty")]
    EmptyPayload,

    /// Nothing has been published yet.
    #[error("No firmware has been published")]
    NotFound,

    /// Persisting a new image failed; the previous image is still current.
    #[error("Failed to publish firmware: {source}")]
    PublishFailed {
        #[source]
        source: io::Error,
    },

    /// Opening or recovering the store failed.
    #[error("Firmware storage error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for firmware storage implementations.
///
/// All methods are synchronous. File-backed implementations block on disk
/// I/O during [`publish`](FirmwareStore::publish), so async callers should
/// run it on a blocking thread.
pub trait FirmwareStore: Send + Sync {
    /// Make `payload` the current image and return its extracted version.
    fn publish(&self, payload: Bytes) -> Result<FirmwareVersion, StoreError>;

    /// Snapshot of the current image, if any has been published.
    fn current(&self) -> Option<Arc<FirmwareImage>>;

    /// Version of the current image, or `0.0.0` if nothing was published.
    fn current_version(&self) -> FirmwareVersion {
        self.current()
            .map(|image| image.version().clone())
            .unwrap_or_default()
    }

    /// Payload of the current image.
    fn current_binary(&self) -> Result<Bytes, StoreError> {
        self.current()
            .map(|image| image.payload().clone())
            .ok_or(StoreError::NotFound)
    }
}

/// Shared slot holding the current image.
///
/// Writers replace the whole `Arc` inside one short critical section, so a
/// reader either sees the old image or the new one.
#[derive(Debug, Default)]
pub(crate) struct CurrentImage {
    slot: RwLock<Option<Arc<FirmwareImage>>>,
}

impl CurrentImage {
    pub(crate) fn new(image: Option<Arc<FirmwareImage>>) -> Self {
        Self {
            slot: RwLock::new(image),
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<FirmwareImage>> {
        // A panicked writer cannot leave a half-built image behind, so the
        // poisoned value is still a complete snapshot.
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace(&self, image: Arc<FirmwareImage>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }
}

/// In-memory firmware store.
///
/// Nothing survives a restart. Used by tests and as a reference for the
/// publish contract.
#[derive(Debug, Default)]
pub struct MemoryFirmwareStore {
    current: CurrentImage,
}

impl MemoryFirmwareStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FirmwareStore for MemoryFirmwareStore {
    fn publish(&self, payload: Bytes) -> Result<FirmwareVersion, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let image = FirmwareImage::new(payload);
        let version = image.version().clone();
        info!(%version, size = image.len(), "Published firmware");

        self.current.replace(Arc::new(image));
        Ok(version)
    }

    fn current(&self) -> Option<Arc<FirmwareImage>> {
        self.current.get()
    }
}
