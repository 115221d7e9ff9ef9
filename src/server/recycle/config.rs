use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecycleConfig {
    /// Delete expired sessions in the background.
    #[serde(default = "RecycleConfig::default_enable")]
    pub enable: bool,

    #[serde(default = "RecycleConfig::default_interval_secs")]
    pub interval_secs: u64,
}

impl CommonConfig for RecycleConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            interval_secs: Self::default_interval_secs(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.enable && self.interval_secs < Self::MIN_INTERVAL_SECS {
            bail!(
                "interval_secs must be greater than or equal to {}",
                Self::MIN_INTERVAL_SECS
            );
        }
        Ok(())
    }
}

impl RecycleConfig {
    const MIN_INTERVAL_SECS: u64 = 60;

    pub fn default_enable() -> bool {
        true
    }

    pub fn default_interval_secs() -> u64 {
        60 * 60 // 1 hour
    }
}
