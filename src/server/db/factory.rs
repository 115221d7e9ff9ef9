use std::sync::Arc;

use anyhow::{Context, Result};

use super::config::{DbBackend, DbConfig};
use super::sqlite::factory::SqliteFactory;
use super::{Database, UnionConnection};

pub struct DbFactory;

impl DbFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_db(&self, cfg: &DbConfig) -> Result<Arc<Database>> {
        let conn = match cfg.backend {
            DbBackend::Sqlite => {
                let sqlite = SqliteFactory::new()
                    .build_sqlite(&cfg.sqlite)
                    .context("init sqlite")?;
                UnionConnection::Sqlite(sqlite)
            }
        };

        Ok(Arc::new(Database::new(conn)))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use crate::config::CommonConfig;
    use crate::server::db::{Lookup, USERS};

    use super::*;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("memberd-db-factory-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut cfg = DbConfig::default();
        cfg.sqlite.path = format!("{}", dir.join("store.db").display());

        let factory = DbFactory::new();
        let db = factory.build_db(&cfg).unwrap();
        let user = json!({"username": "alice"});
        let id = db
            .with_transaction(|tx| tx.create_document(USERS, user.as_object().unwrap()))
            .unwrap()["id"]
            .as_i64()
            .unwrap();
        drop(db);

        let db = factory.build_db(&cfg).unwrap();
        let user = db
            .with_transaction(|tx| tx.get_document(USERS, id, &Lookup::all()))
            .unwrap()
            .unwrap();
        assert_eq!(user["username"], "alice");

        fs::remove_dir_all(&dir).unwrap();
    }
}
