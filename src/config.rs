//! Configuration loading and parsing

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const GMMK_VENDOR_ID: u16 = 0x0c45;
pub const GMMK_PRODUCT_ID: u16 = 0x652f;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub vendor_id: u16,
    pub product_id: u16,
    /// USB interface carrying the vendor endpoints
    pub interface: u8,
    /// Explicit hidraw node, skips discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<PathBuf>,
    /// How long to wait for the reply to each body frame
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_id: GMMK_VENDOR_ID,
            product_id: GMMK_PRODUCT_ID,
            interface: 1,
            device_path: None,
            timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the default config path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("gmmkctl");
        Ok(config_dir.join("config.json"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
