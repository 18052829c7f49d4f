//! Client configuration.
//!
//! Loads configuration from a TOML file with the minimal parameters needed
//! to stand up a device session against an already-authenticated transport.

use crate::error::{Error, Result};
use crate::types::ProtocolFlavor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub map: MapConfig,
}

/// Identity of the device this session controls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device id as registered with the cloud account
    pub device_id: String,
    /// Model class identifier from the account API
    pub model_class: String,
    /// Device nickname, for logs only
    #[serde(default)]
    pub nickname: Option<String>,
    /// Force a protocol flavor instead of the capability table's default.
    /// Needed for region-specific firmware that answers on the other stack.
    #[serde(default)]
    pub protocol_override: Option<ProtocolFlavor>,
}

/// Map handling options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    /// Render and emit a live-map frame after every minor patch
    pub live_render_on_patch: bool,
    /// How many clean-log entries to request from the log service
    pub clean_log_count: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            live_render_on_patch: false,
            clean_log_count: 20,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ClientConfig =
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config)
    }
}
