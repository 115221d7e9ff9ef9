use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::server::db::Transaction;

use super::matrix::GrantTable;
use super::{Authorizer, AuthzRequest, AuthzResponse};

/// Decides requests made with an api key from the key's own grant table.
/// Never falls through: a key that lacks the grant is denied.
pub struct ApiKeyAuthorizer {
    keys: HashMap<String, GrantTable>,
}

impl ApiKeyAuthorizer {
    pub fn new(keys: HashMap<String, GrantTable>) -> Self {
        Self { keys }
    }
}

impl Authorizer for ApiKeyAuthorizer {
    fn authorize_request(&self, _tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        let key = match req.user.api_key.as_ref() {
            Some(key) => key,
            None => return Ok(AuthzResponse::Continue),
        };

        let granted = self
            .keys
            .get(key)
            .map(|table| table.grants(&req.resource, req.method))
            .unwrap_or(false);
        if granted {
            debug!("Api key granted {} on {}", req.method, req.resource);
            return Ok(AuthzResponse::Admin);
        }

        Ok(AuthzResponse::Forbidden)
    }
}
