use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::dirs::ensure_dir_exists;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SqliteConfig {
    /// Keep the whole store in memory. Users, sessions and documents are lost
    /// on restart; meant for tests and demos.
    #[serde(default = "SqliteConfig::default_memory")]
    pub memory: bool,

    /// Database file. Default: {data_path}/memberd.db
    #[serde(default = "SqliteConfig::default_path")]
    pub path: String,

    /// Open file databases in WAL journal mode, so readers outside the server
    /// (backups, inspection) do not block writes.
    #[serde(default = "SqliteConfig::default_wal")]
    pub wal: bool,
}

impl CommonConfig for SqliteConfig {
    fn default() -> Self {
        Self {
            memory: Self::default_memory(),
            path: Self::default_path(),
            wal: Self::default_wal(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.memory {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_path.join("memberd.db");
            self.path = format!("{}", path.display());
        }

        if let Some(dir) = Path::new(&self.path).parent() {
            if !dir.as_os_str().is_empty() {
                ensure_dir_exists(dir)
                    .with_context(|| format!("ensure sqlite directory: {}", dir.display()))?;
            }
        }

        Ok(())
    }
}

impl SqliteConfig {
    pub fn default_memory() -> bool {
        false
    }

    pub fn default_path() -> String {
        String::new()
    }

    pub fn default_wal() -> bool {
        true
    }
}
