use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// StaleConfig
// ---------------------------------------------------------------------------

/// Thresholds for the staleness detector, counted in unchanged poll cycles.
/// Tune `flag_after` per workload: 2 for quick tasks, 4 for typical ones,
/// 8 for tasks expected to run long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleConfig {
    #[serde(default = "default_suspect_after")]
    pub suspect_after: u32,
    #[serde(default = "default_flag_after")]
    pub flag_after: u32,
    /// Poll interval for `dispatch watch`.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_suspect_after() -> u32 {
    2
}

fn default_flag_after() -> u32 {
    4
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            suspect_after: default_suspect_after(),
            flag_after: default_flag_after(),
            interval_secs: default_interval_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stale: StaleConfig,
}

impl Config {
    /// Load `.dispatch/config.yaml`, falling back to defaults when the file
    /// is absent. A malformed file is still an error.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::config_path(root), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
