//! Firmware version markers.
//!
//! Firmware builds embed their version as a literal tag somewhere in the
//! binary image, e.g. `FW-V:1.4.2`. This module scans raw bytes for that tag
//! and exposes the result as a [`FirmwareVersion`].
//!
//! The scan is binary-safe: the payload is never decoded as text, and the
//! first marker in the byte stream wins. Payloads without a marker resolve
//! to [`FirmwareVersion::UNKNOWN`] rather than an error.

use regex::bytes::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Literal prefix of an embedded version marker.
pub const VERSION_MARKER: &str = "FW-V:";

/// Errors produced when parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string is not three dot-separated groups of decimal digits.
    #[error("Invalid firmware version: {0:?}")]
    InvalidFormat(String),
}

/// A `MAJOR.MINOR.PATCH` firmware version.
///
/// Only ASCII digits and exactly two dots are accepted, so the string form is
/// always safe to serve as a plain-text response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirmwareVersion(String);

impl FirmwareVersion {
    /// Sentinel reported when no version is known.
    pub const UNKNOWN: &'static str = "0.0.0";

    /// Parse a version string, rejecting anything but `digits.digits.digits`.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let mut groups = 0;
        for group in s.split('.') {
            if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidFormat(s.to_string()));
            }
            groups += 1;
        }
        if groups != 3 {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The version reported before anything has been published.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// True for the `0.0.0` sentinel.
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FirmwareVersion {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FirmwareVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // `\d` would also match non-ASCII digits; the marker is ASCII only.
    MARKER.get_or_init(|| {
        Regex::new(r"FW-V:([0-9]+\.[0-9]+\.[0-9]+)").expect("version marker pattern is valid")
    })
}

/// Extract the embedded version from a firmware payload.
///
/// Returns the version following the first `FW-V:` marker, or
/// [`FirmwareVersion::UNKNOWN`] when the payload carries no marker.
pub fn extract_version(payload: &[u8]) -> FirmwareVersion {
    let found = marker_regex()
        .captures(payload)
        .and_then(|caps| caps.get(1))
        .map(|m| FirmwareVersion(String::from_utf8_lossy(m.as_bytes()).into_owned()));

    match found {
        Some(version) => {
            debug!(%version, size = payload.len(), "Found firmware version marker");
            version
        }
        None => {
            debug!(size = payload.len(), "No firmware version marker found");
            FirmwareVersion::unknown()
        }
    }
}
