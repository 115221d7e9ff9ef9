mod sqlite;

#[cfg(test)]
mod tests;

pub mod config;
pub mod factory;

use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::{bail, Result};
use serde_json::Value;
use sqlite::{Sqlite, SqliteTransaction};
use thiserror::Error;

use crate::types::document::Document;
use crate::types::owner::OwnerFilter;

/// Resource name of login sessions.
pub const SESSIONS: &str = "sessions";
/// Resource name of user identities.
pub const USERS: &str = "users";
/// Resource name of role assignments (`{user, role}` documents).
pub const PERMISSIONS: &str = "permissions";

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    fn transaction(&'a mut self) -> Result<T>;
}

/// All store operations available inside a transaction.
pub trait Transaction {
    // Document operations
    /// Stores a new document and returns it with its assigned id
    fn create_document(&self, resource: &str, doc: &Document) -> Result<Document>;
    /// Stores a new document under a caller-chosen id
    fn create_document_with_id(&self, resource: &str, id: i64, doc: &Document)
        -> Result<Document>;
    /// Retrieves a document by id, restricted by the lookup
    fn get_document(&self, resource: &str, id: i64, lookup: &Lookup) -> Result<Option<Document>>;
    /// Lists documents, restricted by the lookup
    fn list_documents(&self, resource: &str, lookup: &Lookup) -> Result<Vec<Document>>;
    /// Finds documents whose fields equal every given value
    fn find_documents(&self, resource: &str, filters: &[(String, Value)]) -> Result<Vec<Document>>;
    /// Checks whether a document exists
    fn is_document_exists(&self, resource: &str, id: i64) -> Result<bool>;
    /// Replaces the whole document body
    fn replace_document(&self, resource: &str, id: i64, doc: &Document) -> Result<Document>;
    /// Merges the given fields into the stored document
    fn update_document(&self, resource: &str, id: i64, changes: &Document) -> Result<Document>;
    /// Deletes a document
    fn delete_document(&self, resource: &str, id: i64) -> Result<()>;

    // Session operations
    /// Creates a session; fails with [`DbError::Conflict`] on a duplicated token
    fn create_session(&self, user: i64, token: &str) -> Result<Document>;
    /// Looks up a session by its exact token
    fn get_session_by_token(&self, token: &str) -> Result<Option<Document>>;
    /// Deletes sessions created before the given time
    fn delete_sessions_before(&self, time: u64) -> Result<usize>;

    // User operations
    /// Lists role names assigned to a user
    fn list_user_roles(&self, user: i64) -> Result<Vec<String>>;
    /// Replaces a user's stored credential hash
    fn update_user_password(&self, user: i64, hash: &str) -> Result<()>;

    /// Commits the transaction
    fn commit(self) -> Result<()>;
    /// Rolls back the transaction
    fn rollback(self) -> Result<()>;
}

/// Store errors callers need to tell apart from generic failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("document {resource}/{id} not found")]
    NotFound { resource: String, id: i64 },
}

impl DbError {
    pub fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DbError>(), Some(DbError::Conflict(_)))
    }

    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DbError>(), Some(DbError::NotFound { .. }))
    }
}

/// Query restrictions applied to reads. An empty lookup matches everything.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub owner: Option<OwnerFilter>,
}

impl Lookup {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(filter: OwnerFilter) -> Self {
        Self {
            owner: Some(filter),
        }
    }
}

pub struct Database {
    conn: Mutex<RefCell<UnionConnection>>,
}

pub enum UnionConnection {
    Sqlite(Sqlite),
}

enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

impl Database {
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            conn: Mutex::new(RefCell::new(conn)),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let conn = Sqlite::memory().unwrap();
        Self::new(UnionConnection::Sqlite(conn))
    }

    /// Runs `f` inside a transaction. The transaction is committed when `f`
    /// returns `Ok` and rolled back when it returns `Err`.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        let mut conn = conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = f(&tx);

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_document(&self, resource: &str, doc: &Document) -> Result<Document> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_document(resource, doc),
        }
    }

    fn create_document_with_id(
        &self,
        resource: &str,
        id: i64,
        doc: &Document,
    ) -> Result<Document> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_document_with_id(resource, id, doc),
        }
    }

    fn get_document(&self, resource: &str, id: i64, lookup: &Lookup) -> Result<Option<Document>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_document(resource, id, lookup),
        }
    }

    fn list_documents(&self, resource: &str, lookup: &Lookup) -> Result<Vec<Document>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_documents(resource, lookup),
        }
    }

    fn find_documents(&self, resource: &str, filters: &[(String, Value)]) -> Result<Vec<Document>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.find_documents(resource, filters),
        }
    }

    fn is_document_exists(&self, resource: &str, id: i64) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_document_exists(resource, id),
        }
    }

    fn replace_document(&self, resource: &str, id: i64, doc: &Document) -> Result<Document> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.replace_document(resource, id, doc),
        }
    }

    fn update_document(&self, resource: &str, id: i64, changes: &Document) -> Result<Document> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_document(resource, id, changes),
        }
    }

    fn delete_document(&self, resource: &str, id: i64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_document(resource, id),
        }
    }

    fn create_session(&self, user: i64, token: &str) -> Result<Document> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_session(user, token),
        }
    }

    fn get_session_by_token(&self, token: &str) -> Result<Option<Document>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_session_by_token(token),
        }
    }

    fn delete_sessions_before(&self, time: u64) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_sessions_before(time),
        }
    }

    fn list_user_roles(&self, user: i64) -> Result<Vec<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_user_roles(user),
        }
    }

    fn update_user_password(&self, user: i64, hash: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_user_password(user, hash),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
