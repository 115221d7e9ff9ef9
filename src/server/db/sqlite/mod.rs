mod document;
mod session;
mod user;

pub mod config;
pub mod factory;

use std::path::Path;

use anyhow::Result;
use log::debug;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;
use serde_json::Value;

use crate::types::document::Document;

use super::{Connection, Lookup, Transaction};

/// SQLite-backed store. Every resource lives in one `document` table as a JSON
/// body; supports both file-based and in-memory databases.
pub struct Sqlite {
    conn: RawConnection,
}

pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl Sqlite {
    /// Opens a SQLite database file, creating it and its tables if needed.
    pub fn open(path: &Path, wal: bool) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        if wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("Sqlite journal mode: {mode}");
        }
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates a new in-memory database. Content is lost when the program exits.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    fn init_tables(db: &RawConnection) -> Result<()> {
        document::create_document_tables(db)?;
        session::create_session_indexes(db)?;
        user::create_user_indexes(db)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_document(&self, resource: &str, doc: &Document) -> Result<Document> {
        document::create_document(&self.tx, resource, None, doc)
    }

    fn create_document_with_id(
        &self,
        resource: &str,
        id: i64,
        doc: &Document,
    ) -> Result<Document> {
        document::create_document(&self.tx, resource, Some(id), doc)
    }

    fn get_document(&self, resource: &str, id: i64, lookup: &Lookup) -> Result<Option<Document>> {
        document::get_document(&self.tx, resource, id, lookup)
    }

    fn list_documents(&self, resource: &str, lookup: &Lookup) -> Result<Vec<Document>> {
        document::list_documents(&self.tx, resource, lookup)
    }

    fn find_documents(&self, resource: &str, filters: &[(String, Value)]) -> Result<Vec<Document>> {
        document::find_documents(&self.tx, resource, filters)
    }

    fn is_document_exists(&self, resource: &str, id: i64) -> Result<bool> {
        document::is_document_exists(&self.tx, resource, id)
    }

    fn replace_document(&self, resource: &str, id: i64, doc: &Document) -> Result<Document> {
        document::replace_document(&self.tx, resource, id, doc)
    }

    fn update_document(&self, resource: &str, id: i64, changes: &Document) -> Result<Document> {
        document::update_document(&self.tx, resource, id, changes)
    }

    fn delete_document(&self, resource: &str, id: i64) -> Result<()> {
        document::delete_document(&self.tx, resource, id)
    }

    fn create_session(&self, user: i64, token: &str) -> Result<Document> {
        session::create_session(&self.tx, user, token)
    }

    fn get_session_by_token(&self, token: &str) -> Result<Option<Document>> {
        session::get_session_by_token(&self.tx, token)
    }

    fn delete_sessions_before(&self, time: u64) -> Result<usize> {
        session::delete_sessions_before(&self.tx, time)
    }

    fn list_user_roles(&self, user: i64) -> Result<Vec<String>> {
        user::list_user_roles(&self.tx, user)
    }

    fn update_user_password(&self, user: i64, hash: &str) -> Result<()> {
        user::update_user_password(&self.tx, user, hash)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
