use log::{debug, warn};
use serde_json::Value;

use crate::server::db::Transaction;
use crate::types::document::{get_identity, Document};
use crate::types::owner::{OwnerPath, OwnerStep};

use super::AuthzError;

/// Walks `path` over `payload` and returns the identity it ends at.
///
/// `payload` may be a document that does not exist yet. Every relation step
/// must resolve to exactly one related document.
pub fn resolve_owner_identity(
    tx: &dyn Transaction,
    path: &OwnerPath,
    payload: &Document,
) -> Result<i64, AuthzError> {
    let mut current = payload.clone();
    for step in path.steps() {
        match step {
            OwnerStep::Field(field) => {
                return match get_identity(&current, field) {
                    Some(identity) => Ok(identity),
                    None => Err(AuthzError::UnresolvableOwnership(format!(
                        "'{path}': field '{field}' is missing or not an identity"
                    ))),
                };
            }
            OwnerStep::Relation {
                name,
                resource,
                keys,
            } => {
                let mut filters = Vec::with_capacity(keys.len());
                for key in keys.iter() {
                    match current.get(&key.local) {
                        Some(value @ (Value::Number(_) | Value::String(_) | Value::Bool(_))) => {
                            filters.push((key.remote.clone(), value.clone()))
                        }
                        Some(value) if !value.is_null() => {
                            return Err(AuthzError::UnresolvableOwnership(format!(
                                "'{path}': key '{}' of relation '{name}' is not a scalar",
                                key.local
                            )))
                        }
                        _ => {
                            return Err(AuthzError::UnresolvableOwnership(format!(
                                "'{path}': key '{}' of relation '{name}' is missing",
                                key.local
                            )))
                        }
                    }
                }

                let mut related = tx.find_documents(resource, &filters)?;
                if related.len() != 1 {
                    return Err(AuthzError::UnresolvableOwnership(format!(
                        "'{path}': relation '{name}' matched {} {resource}, expected exactly one",
                        related.len()
                    )));
                }
                current = related.remove(0);
            }
        }
    }

    Err(AuthzError::UnresolvableOwnership(format!(
        "'{path}' does not end at a field"
    )))
}

/// Succeeds when any of `paths` resolves to `user` on `payload`.
pub fn will_be_owner(
    tx: &dyn Transaction,
    paths: &[OwnerPath],
    payload: &Document,
    user: i64,
) -> Result<(), AuthzError> {
    if paths.is_empty() {
        return Err(AuthzError::ConfigurationGap(String::from(
            "ownership required but no owner field is configured",
        )));
    }

    let mut unresolvable = None;
    for path in paths.iter() {
        match resolve_owner_identity(tx, path, payload) {
            Ok(identity) if identity == user => {
                debug!("User {user} owns the document through '{path}'");
                return Ok(());
            }
            Ok(_) => {}
            Err(AuthzError::UnresolvableOwnership(reason)) => {
                unresolvable.get_or_insert(reason);
            }
            Err(err) => return Err(err),
        }
    }

    match unresolvable {
        Some(reason) => {
            warn!("Ownership of user {user} could not be resolved: {reason}");
            Err(AuthzError::UnresolvableOwnership(reason))
        }
        None => Err(AuthzError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::CommonConfig;
    use crate::server::authz::capability::CapabilityRegistry;
    use crate::server::authz::config::AuthzConfig;
    use crate::server::db::Database;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn signup_paths() -> Vec<OwnerPath> {
        let registry = CapabilityRegistry::compile(&AuthzConfig::default().resources).unwrap();
        registry.get("signups").unwrap().owner_paths.clone()
    }

    fn setup() -> Database {
        let db = Database::new_test();
        db.with_transaction(|tx| {
            tx.create_document_with_id("events", 1, &doc(json!({"title": "a", "organizer": 7})))?;
            tx.create_document_with_id("events", 2, &doc(json!({"title": "b", "organizer": 9})))?;
            tx.create_document_with_id("events", 3, &doc(json!({"title": "c"})))?;
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn test_resolve_owner_identity() {
        let db = setup();
        let paths = signup_paths();
        let (user, organizer) = (&paths[0], &paths[1]);

        let resolve = |path: &OwnerPath, payload: Value| {
            db.with_transaction(|tx| Ok(resolve_owner_identity(tx, path, &doc(payload))))
                .unwrap()
        };

        assert_eq!(resolve(user, json!({"user": 8, "event": 1})).unwrap(), 8);
        assert_eq!(resolve(organizer, json!({"user": 8, "event": 1})).unwrap(), 7);
        assert_eq!(resolve(organizer, json!({"event": 2})).unwrap(), 9);

        // Deterministic
        for _ in 0..3 {
            assert_eq!(resolve(organizer, json!({"event": 1})).unwrap(), 7);
        }

        for payload in [
            json!({"event": 404}),
            json!({"event": null}),
            json!({"user": 8}),
            json!({"event": 3}),
            json!({"event": [1]}),
            json!({"event": {"id": 1}}),
        ] {
            assert!(matches!(
                resolve(organizer, payload),
                Err(AuthzError::UnresolvableOwnership(_))
            ));
        }
        assert!(matches!(
            resolve(user, json!({"user": "eight"})),
            Err(AuthzError::UnresolvableOwnership(_))
        ));
    }

    #[test]
    fn test_ambiguous_relation() {
        let db = setup();
        let path = OwnerPath::new(
            "event.organizer",
            vec![
                OwnerStep::Relation {
                    name: "event".to_string(),
                    resource: "events".to_string(),
                    keys: vec![crate::types::owner::KeyPair {
                        local: "event_title".to_string(),
                        remote: "title".to_string(),
                    }],
                },
                OwnerStep::Field("organizer".to_string()),
            ],
        );
        db.with_transaction(|tx| {
            tx.create_document("events", &doc(json!({"title": "a", "organizer": 8})))?;
            Ok(())
        })
        .unwrap();

        let result = db
            .with_transaction(|tx| {
                Ok(resolve_owner_identity(
                    tx,
                    &path,
                    &doc(json!({"event_title": "a"})),
                ))
            })
            .unwrap();
        assert!(matches!(result, Err(AuthzError::UnresolvableOwnership(_))));
    }

    #[test]
    fn test_will_be_owner() {
        let db = setup();
        let paths = signup_paths();

        let check = |payload: Value, user: i64| {
            db.with_transaction(|tx| Ok(will_be_owner(tx, &paths, &doc(payload), user)))
                .unwrap()
        };

        assert!(check(json!({"user": 8, "event": 1}), 8).is_ok());
        // Organizer of the event owns every signup to it
        assert!(check(json!({"user": 8, "event": 1}), 7).is_ok());
        assert!(matches!(
            check(json!({"user": 8, "event": 1}), 9),
            Err(AuthzError::Forbidden)
        ));
        // The user path still proves ownership when the relation dangles
        assert!(check(json!({"user": 8, "event": 404}), 8).is_ok());
        assert!(matches!(
            check(json!({"user": 8, "event": 404}), 9),
            Err(AuthzError::UnresolvableOwnership(_))
        ));
        assert!(matches!(
            check(json!({"user": 7, "event": [1]}), 8),
            Err(AuthzError::UnresolvableOwnership(_))
        ));
        assert!(matches!(
            check(json!({"event": {"id": 1}}), 8),
            Err(AuthzError::UnresolvableOwnership(_))
        ));

        let result = db
            .with_transaction(|tx| Ok(will_be_owner(tx, &[], &doc(json!({"user": 8})), 8)))
            .unwrap();
        assert!(matches!(result, Err(AuthzError::ConfigurationGap(_))));
    }
}
