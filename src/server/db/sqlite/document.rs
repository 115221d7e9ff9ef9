use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use crate::server::db::{DbError, Lookup};
use crate::types::document::{is_field_name, merge_document, Document, ID_FIELD};
use crate::types::owner::{OwnerFilter, OwnerStep};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS document (
    id INTEGER PRIMARY KEY,
    resource TEXT NOT NULL,
    data TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_resource ON document(resource);
"#;

pub fn create_document_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_document(
    tx: &Transaction,
    resource: &str,
    id: Option<i64>,
    doc: &Document,
) -> Result<Document> {
    let data = encode_body(doc)?;
    let now = Utc::now().timestamp();
    tx.execute(
        "INSERT INTO document (id, resource, data, create_time, update_time) VALUES (?, ?, ?, ?, ?)",
        params![id, resource, data, now, now],
    )?;
    let id = tx.last_insert_rowid();

    let mut doc = doc.clone();
    doc.insert(String::from(ID_FIELD), Value::from(id));
    Ok(doc)
}

pub fn get_document(
    tx: &Transaction,
    resource: &str,
    id: i64,
    lookup: &Lookup,
) -> Result<Option<Document>> {
    let mut params = vec![SqlValue::Text(resource.to_string()), SqlValue::Integer(id)];
    let mut sql = String::from("SELECT d.id, d.data FROM document d WHERE d.resource = ? AND d.id = ?");
    if let Some(ref owner) = lookup.owner {
        let cond = owner_condition(owner, &mut params);
        sql.push_str(&format!(" AND {cond}"));
    }
    debug!("Get document: {sql}");

    let mut stmt = tx.prepare(&sql)?;
    let row: Option<(i64, String)> = stmt
        .query_row(params_from_iter(params), |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    match row {
        Some((id, data)) => Ok(Some(decode_body(id, &data)?)),
        None => Ok(None),
    }
}

pub fn list_documents(tx: &Transaction, resource: &str, lookup: &Lookup) -> Result<Vec<Document>> {
    let mut params = vec![SqlValue::Text(resource.to_string())];
    let mut sql = String::from("SELECT d.id, d.data FROM document d WHERE d.resource = ?");
    if let Some(ref owner) = lookup.owner {
        let cond = owner_condition(owner, &mut params);
        sql.push_str(&format!(" AND {cond}"));
    }
    sql.push_str(" ORDER BY d.id");
    debug!("List documents: {sql}");

    query_documents(tx, &sql, params)
}

pub fn find_documents(
    tx: &Transaction,
    resource: &str,
    filters: &[(String, Value)],
) -> Result<Vec<Document>> {
    let mut params = vec![SqlValue::Text(resource.to_string())];
    let mut sql = String::from("SELECT d.id, d.data FROM document d WHERE d.resource = ?");
    for (field, value) in filters.iter() {
        let column = column("d", field)?;
        match to_sql_value(value)? {
            SqlValue::Null => sql.push_str(&format!(" AND {column} IS NULL")),
            value => {
                sql.push_str(&format!(" AND {column} = ?"));
                params.push(value);
            }
        }
    }
    sql.push_str(" ORDER BY d.id");
    debug!("Find documents: {sql}");

    query_documents(tx, &sql, params)
}

pub fn is_document_exists(tx: &Transaction, resource: &str, id: i64) -> Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM document WHERE resource = ? AND id = ?",
        params![resource, id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn replace_document(
    tx: &Transaction,
    resource: &str,
    id: i64,
    doc: &Document,
) -> Result<Document> {
    let data = encode_body(doc)?;
    let now = Utc::now().timestamp();
    let count = tx.execute(
        "UPDATE document SET data = ?, update_time = ? WHERE resource = ? AND id = ?",
        params![data, now, resource, id],
    )?;
    if count == 0 {
        return Err(DbError::NotFound {
            resource: resource.to_string(),
            id,
        }
        .into());
    }

    let mut doc = doc.clone();
    doc.insert(String::from(ID_FIELD), Value::from(id));
    Ok(doc)
}

pub fn update_document(
    tx: &Transaction,
    resource: &str,
    id: i64,
    changes: &Document,
) -> Result<Document> {
    let original = match get_document(tx, resource, id, &Lookup::all())? {
        Some(doc) => doc,
        None => {
            return Err(DbError::NotFound {
                resource: resource.to_string(),
                id,
            }
            .into())
        }
    };
    let merged = merge_document(&original, changes);
    replace_document(tx, resource, id, &merged)
}

pub fn delete_document(tx: &Transaction, resource: &str, id: i64) -> Result<()> {
    let count = tx.execute(
        "DELETE FROM document WHERE resource = ? AND id = ?",
        params![resource, id],
    )?;
    if count == 0 {
        return Err(DbError::NotFound {
            resource: resource.to_string(),
            id,
        }
        .into());
    }
    Ok(())
}

fn query_documents(tx: &Transaction, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Document>> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.iter()
        .map(|(id, data)| decode_body(*id, data))
        .collect()
}

/// Builds the SQL condition for an ownership filter. Owner paths are OR-ed; a
/// relation step becomes a correlated `EXISTS` over the related resource.
fn owner_condition(filter: &OwnerFilter, params: &mut Vec<SqlValue>) -> String {
    let mut conds = Vec::with_capacity(filter.paths.len());
    for path in filter.paths.iter() {
        conds.push(path_condition(path.steps(), "d", 0, filter.user, params));
    }
    if conds.is_empty() {
        // No owner field can never match anybody
        return String::from("0");
    }
    format!("({})", conds.join(" OR "))
}

fn path_condition(
    steps: &[OwnerStep],
    alias: &str,
    depth: usize,
    user: i64,
    params: &mut Vec<SqlValue>,
) -> String {
    match steps.split_first() {
        None => String::from("0"),
        Some((OwnerStep::Field(name), _)) => match column(alias, name) {
            Ok(column) if name == ID_FIELD => {
                params.push(SqlValue::Integer(user));
                format!("{column} = ?")
            }
            Ok(column) => {
                // Only integer identities own; 2.0 and true compare equal in SQLite
                params.push(SqlValue::Integer(user));
                format!("(json_type({alias}.data, '$.{name}') = 'integer' AND {column} = ?)")
            }
            Err(_) => String::from("0"),
        },
        Some((OwnerStep::Relation { resource, keys, .. }, rest)) => {
            let rel = format!("r{depth}");
            params.push(SqlValue::Text(resource.clone()));
            let mut conds = vec![format!("{rel}.resource = ?")];
            for key in keys.iter() {
                match (column(&rel, &key.remote), column(alias, &key.local)) {
                    (Ok(remote), Ok(local)) => conds.push(format!("{remote} = {local}")),
                    _ => return String::from("0"),
                }
            }
            conds.push(path_condition(rest, &rel, depth + 1, user, params));
            format!(
                "EXISTS (SELECT 1 FROM document {rel} WHERE {})",
                conds.join(" AND ")
            )
        }
    }
}

fn column(alias: &str, field: &str) -> Result<String> {
    if field == ID_FIELD {
        return Ok(format!("{alias}.id"));
    }
    if !is_field_name(field) {
        bail!("invalid field name '{field}'");
    }
    Ok(format!("json_extract({alias}.data, '$.{field}')"))
}

fn to_sql_value(value: &Value) -> Result<SqlValue> {
    let value = match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => match n.as_f64() {
                Some(f) => SqlValue::Real(f),
                None => bail!("unsupported number {n}"),
            },
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => bail!("cannot filter on structured value"),
    };
    Ok(value)
}

fn encode_body(doc: &Document) -> Result<String> {
    let mut body = doc.clone();
    body.remove(ID_FIELD);
    serde_json::to_string(&body).context("encode document body")
}

fn decode_body(id: i64, data: &str) -> Result<Document> {
    let mut doc: Document = serde_json::from_str(data)
        .with_context(|| format!("decode body of document {id}"))?;
    doc.insert(String::from(ID_FIELD), Value::from(id));
    Ok(doc)
}
