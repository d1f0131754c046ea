//! Configuration system.
//!
//! Loads engine configuration from JSON strings or files. Every field has a
//! default, so an empty object (`{}`) is a valid config.

use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::handle_mgr::MAX_CAPACITY;

/// Root configuration for the asset and pool subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory texture filenames are resolved against.
    #[serde(default = "default_texture_root")]
    pub texture_root: String,
    /// Capacity of handle pools created from this config.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
}

fn default_texture_root() -> String {
    "textures".to_string()
}

fn default_pool_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            texture_root: default_texture_root(),
            pool_capacity: default_pool_capacity(),
        }
    }
}

impl EngineConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    /// Checks values serde cannot: the pool must fit in the handle index bits.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.pool_capacity <= MAX_CAPACITY,
            "pool_capacity {} exceeds the maximum of {MAX_CAPACITY}",
            self.pool_capacity
        );
        Ok(())
    }
}
