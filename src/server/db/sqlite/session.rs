use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, Transaction};
use serde_json::Value;

use crate::server::db::{DbError, SESSIONS};
use crate::types::document::Document;

use super::document;

// A session token must be unique across all live sessions.
const CREATE_INDEXES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_session_token
    ON document(json_extract(data, '$.token'))
    WHERE resource = 'sessions';
"#;

pub fn create_session_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_INDEXES)?;
    Ok(())
}

pub fn create_session(tx: &Transaction, user: i64, token: &str) -> Result<Document> {
    let mut doc = Document::new();
    doc.insert(String::from("user"), Value::from(user));
    doc.insert(String::from("token"), Value::from(token));
    doc.insert(
        String::from("create_time"),
        Value::from(Utc::now().timestamp() as u64),
    );

    match document::create_document(tx, SESSIONS, None, &doc) {
        Ok(doc) => Ok(doc),
        Err(err) => match err.downcast_ref::<rusqlite::Error>() {
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Conflict(String::from("session token")).into())
            }
            _ => Err(err),
        },
    }
}

pub fn get_session_by_token(tx: &Transaction, token: &str) -> Result<Option<Document>> {
    let filters = [(String::from("token"), Value::from(token))];
    let mut sessions = document::find_documents(tx, SESSIONS, &filters)?;
    Ok(sessions.pop())
}

pub fn delete_sessions_before(tx: &Transaction, time: u64) -> Result<usize> {
    let count = tx.execute(
        "DELETE FROM document WHERE resource = ? AND json_extract(data, '$.create_time') < ?",
        params![SESSIONS, time as i64],
    )?;
    Ok(count)
}
