//! Firmware image model.

use bytes::Bytes;

use crate::version::{extract_version, FirmwareVersion};

/// The firmware image served to devices.
///
/// The version is always derived from the payload at construction time, so
/// an image can never carry a version that belongs to different bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    payload: Bytes,
    version: FirmwareVersion,
}

impl FirmwareImage {
    /// Build an image from a raw payload, scanning it for a version marker.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let version = extract_version(&payload);
        Self { payload, version }
    }

    /// The raw binary content.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn version(&self) -> &FirmwareVersion {
        &self.version
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
