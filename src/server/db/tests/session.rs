use serde_json::json;

use crate::server::db::{Database, DbError, Lookup, SESSIONS};
use crate::time::current_timestamp;

pub fn run_session_tests(db: &Database) {
    let session = db
        .with_transaction(|tx| tx.create_session(7, "token-of-seven"))
        .unwrap();
    assert_eq!(session["user"], json!(7));
    assert_eq!(session["token"], json!("token-of-seven"));
    assert!(session["create_time"].as_u64().unwrap() <= current_timestamp());

    db.with_transaction(|tx| {
        let found = tx.get_session_by_token("token-of-seven")?.unwrap();
        assert_eq!(found["id"], session["id"]);
        assert!(tx.get_session_by_token("token-of-nobody")?.is_none());
        Ok(())
    })
    .unwrap();

    // Duplicated tokens are rejected by the store
    let err = db
        .with_transaction(|tx| tx.create_session(8, "token-of-seven"))
        .unwrap_err();
    assert!(DbError::is_conflict(&err));

    // The conflict is recoverable inside the same transaction
    db.with_transaction(|tx| {
        let err = tx.create_session(8, "token-of-seven").unwrap_err();
        assert!(DbError::is_conflict(&err));
        tx.create_session(8, "token-of-eight")?;
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let count = tx.delete_sessions_before(current_timestamp() + 10)?;
        assert_eq!(count, 2);
        assert!(tx.list_documents(SESSIONS, &Lookup::all())?.is_empty());
        Ok(())
    })
    .unwrap();
}
