use anyhow::Result;
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;

use crate::server::db::{PERMISSIONS, USERS};
use crate::types::document::Document;

use super::document;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_permission_user
    ON document(json_extract(data, '$.user'))
    WHERE resource = 'permissions';
"#;

pub fn create_user_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_INDEXES)?;
    Ok(())
}

pub fn list_user_roles(tx: &Transaction, user: i64) -> Result<Vec<String>> {
    let mut stmt = tx.prepare(
        "SELECT json_extract(data, '$.role') FROM document WHERE resource = ? AND json_extract(data, '$.user') = ? ORDER BY id",
    )?;
    let roles = stmt
        .query_map(params![PERMISSIONS, user], |row| row.get::<_, Option<String>>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roles.into_iter().flatten().collect())
}

pub fn update_user_password(tx: &Transaction, user: i64, hash: &str) -> Result<()> {
    let mut changes = Document::new();
    changes.insert(String::from("password"), Value::from(hash));
    document::update_document(tx, USERS, user, &changes)?;
    Ok(())
}
