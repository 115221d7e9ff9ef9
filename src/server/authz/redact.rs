use std::collections::HashSet;

use log::debug;
use serde_json::Value;

use crate::server::authn::password::CredentialVerifier;
use crate::server::db::USERS;
use crate::types::document::Document;

use super::guard::RequestContext;
use super::AuthzError;

/// Credential hash field of `users`.
pub const PASSWORD_FIELD: &str = "password";

/// Field-level policy for the `users` resource: the credential hash never
/// leaves the server, and directory-managed fields are read-only for
/// everybody but admins.
pub struct FieldRedactor {
    directory_fields: HashSet<String>,
    verifier: CredentialVerifier,
}

impl FieldRedactor {
    pub fn new(directory_fields: impl IntoIterator<Item = String>, verifier: CredentialVerifier) -> Self {
        Self {
            directory_fields: directory_fields.into_iter().collect(),
            verifier,
        }
    }

    pub fn filter_outbound(&self, ctx: &RequestContext, mut doc: Document) -> Document {
        if ctx.resource == USERS {
            doc.remove(PASSWORD_FIELD);
        }
        doc
    }

    /// Rejects projections that ask for the credential hash.
    pub fn check_projection(
        &self,
        resource: &str,
        projection: Option<&str>,
    ) -> Result<(), AuthzError> {
        match projection {
            Some(projection) if resource == USERS && projection.contains(PASSWORD_FIELD) => {
                debug!("Rejected projection of '{PASSWORD_FIELD}' on {resource}");
                Err(AuthzError::Forbidden)
            }
            _ => Ok(()),
        }
    }

    /// Rejects non-admin writes that would change a directory field.
    /// Sending a field back unchanged is allowed.
    pub fn check_inbound(
        &self,
        ctx: &RequestContext,
        changes: &Document,
        original: Option<&Document>,
    ) -> Result<(), AuthzError> {
        if ctx.resource != USERS || ctx.is_resource_admin {
            return Ok(());
        }

        for (field, value) in changes.iter() {
            if !self.directory_fields.contains(field) {
                continue;
            }
            let unchanged = original.and_then(|o| o.get(field)) == Some(value);
            if !unchanged {
                debug!("User {} may not change directory field '{field}'", ctx.user.id);
                return Err(AuthzError::Forbidden);
            }
        }
        Ok(())
    }

    /// Replaces a plaintext password in an inbound `users` document with
    /// its hash.
    pub fn seal_credentials(&self, resource: &str, doc: &mut Document) {
        if resource != USERS {
            return;
        }
        let hash = match doc.get(PASSWORD_FIELD) {
            Some(Value::String(plaintext)) => self.verifier.hash(plaintext),
            _ => return,
        };
        doc.insert(PASSWORD_FIELD.to_string(), Value::from(hash));
    }
}
