use anyhow::Result;

use crate::server::db::Transaction;

use super::{Authorizer, AuthzRequest, AuthzResponse};

pub struct RootAuthorizer;

impl RootAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl Authorizer for RootAuthorizer {
    fn authorize_request(&self, _tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        if req.user.is_root() && req.user.api_key.is_none() {
            return Ok(AuthzResponse::Admin);
        }

        Ok(AuthzResponse::Continue)
    }
}
