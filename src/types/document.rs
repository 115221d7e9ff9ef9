use serde_json::{Map, Value};

/// A resource document as submitted by clients and kept by the store.
pub type Document = Map<String, Value>;

/// The field holding a document's store-assigned identifier.
pub const ID_FIELD: &str = "id";

/// The field stamped with the id of the user that wrote the document.
pub const AUTHOR_FIELD: &str = "_author";

/// Reads an identity (user id) from a document field. Only integral JSON numbers
/// are identities; anything else is treated as "no identity".
pub fn get_identity(doc: &Document, field: &str) -> Option<i64> {
    doc.get(field).and_then(Value::as_i64)
}

/// Whether `name` may be used as a document field in store queries. Field names
/// end up inside JSON paths, so only ASCII letters, digits and `_` are allowed.
pub fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Applies `changes` on top of `original`, field by field. The id field of the
/// original always wins.
pub fn merge_document(original: &Document, changes: &Document) -> Document {
    let mut merged = original.clone();
    for (key, value) in changes.iter() {
        if key == ID_FIELD {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_get_identity() {
        let d = doc(json!({"user": 7, "name": "x", "score": 1.5}));
        assert_eq!(get_identity(&d, "user"), Some(7));
        assert_eq!(get_identity(&d, "name"), None);
        assert_eq!(get_identity(&d, "score"), None);
        assert_eq!(get_identity(&d, "missing"), None);
    }

    #[test]
    fn test_is_field_name() {
        assert!(is_field_name("event_id"));
        assert!(is_field_name("_author"));
        assert!(!is_field_name(""));
        assert!(!is_field_name("event.organizer"));
        assert!(!is_field_name("x') OR 1=1 --"));
    }

    #[test]
    fn test_merge_document() {
        let original = doc(json!({"id": 3, "user": 7, "comment": "a"}));
        let changes = doc(json!({"id": 99, "comment": "b", "extra": true}));
        let merged = merge_document(&original, &changes);
        assert_eq!(
            Value::Object(merged),
            json!({"id": 3, "user": 7, "comment": "b", "extra": true})
        );
    }
}
