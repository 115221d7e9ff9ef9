use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use super::config::SqliteConfig;
use super::Sqlite;

pub struct SqliteFactory;

impl SqliteFactory {
    pub fn new() -> Self {
        Self {}
    }

    pub fn build_sqlite(&self, cfg: &SqliteConfig) -> Result<Sqlite> {
        if cfg.memory {
            warn!("Using in-memory sqlite store, users and sessions will be lost when the server stops");
            return Sqlite::memory();
        }

        let path = Path::new(&cfg.path);
        let existed = path.exists();
        let sqlite = Sqlite::open(path, cfg.wal)
            .with_context(|| format!("open sqlite '{}'", cfg.path))?;
        if existed {
            info!("Opened sqlite store: {}", cfg.path);
        } else {
            info!("Created sqlite store: {}", cfg.path);
        }
        Ok(sqlite)
    }
}
