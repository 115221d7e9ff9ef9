use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

use super::sqlite::config::SqliteConfig;

/// Store backing users, sessions, role assignments and every API resource.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default = "DbConfig::default_backend")]
    pub backend: DbBackend,

    #[serde(default = "SqliteConfig::default")]
    pub sqlite: SqliteConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl CommonConfig for DbConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            sqlite: SqliteConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        match self.backend {
            DbBackend::Sqlite => self.sqlite.complete(ps).context("sqlite")?,
        }
        Ok(())
    }
}

impl DbConfig {
    pub fn default_backend() -> DbBackend {
        DbBackend::Sqlite
    }
}
