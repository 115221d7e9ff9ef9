mod session;

use serde_json::Value;

use crate::types::document::Document;

use super::Database;

pub fn run_all_tests(db: &Database) {
    document::run_document_tests(db);
    document::run_owner_filter_tests(db);
    session::run_session_tests(db);
    user::run_user_tests(db);
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expect json object, found {other}"),
    }
}

#[test]
fn test_sqlite() {
    let db = Database::new_test();
    run_all_tests(&db);
}
