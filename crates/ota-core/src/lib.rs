//! # ota-core
//!
//! Core firmware distribution logic for the OTA server.
//!
//! This crate provides:
//! - Version marker extraction from raw firmware binaries
//! - The firmware image model (payload paired with its derived version)
//! - The `FirmwareStore` trait with in-memory and file-backed implementations
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! The HTTP layer decides how to schedule the blocking file I/O.

pub mod fs_store;
pub mod model;
pub mod store;
pub mod version;

pub use fs_store::FileFirmwareStore;
pub use model::FirmwareImage;
pub use store::{FirmwareStore, MemoryFirmwareStore, StoreError};
pub use version::{extract_version, FirmwareVersion, VersionError};
