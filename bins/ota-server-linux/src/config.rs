//! Server configuration.
//!
//! Settings come from an optional JSON file named by `OTA_CONFIG`, then
//! individual environment variables override single fields:
//!
//! | Variable               | Field              | Default        |
//! |------------------------|--------------------|----------------|
//! | `OTA_BIND_ADDR`        | `bind_addr`        | `0.0.0.0:80`   |
//! | `OTA_STORAGE_DIR`      | `storage_dir`      | `./firmware`   |
//! | `OTA_MAX_UPLOAD_BYTES` | `max_upload_bytes` | 16 MiB         |

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "OTA_CONFIG";
const BIND_ADDR_ENV: &str = "OTA_BIND_ADDR";
const STORAGE_DIR_ENV: &str = "OTA_STORAGE_DIR";
const MAX_UPLOAD_BYTES_ENV: &str = "OTA_MAX_UPLOAD_BYTES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Directory holding `firmware.bin` and `version.txt`.
    pub storage_dir: PathBuf,
    /// Largest accepted upload request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
            storage_dir: PathBuf::from("firmware"),
            max_upload_bytes: ota_web::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to read variables.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(addr) = lookup(BIND_ADDR_ENV) {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid {BIND_ADDR_ENV}: {addr:?}"))?;
        }
        if let Some(dir) = lookup(STORAGE_DIR_ENV) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(limit) = lookup(MAX_UPLOAD_BYTES_ENV) {
            config.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("Invalid {MAX_UPLOAD_BYTES_ENV}: {limit:?}"))?;
        }

        anyhow::ensure!(config.max_upload_bytes > 0, "max upload size must be positive");
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
