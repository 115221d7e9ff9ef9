use anyhow::Result;

use crate::server::db::Transaction;

use super::union::UnionAuthorizer;
use super::{Authorizer, AuthzRequest, AuthzResponse};

/// Runs authorizers in order, the first decision wins. A request nobody
/// decided is denied.
pub struct ChainAuthorizer {
    authorizers: Vec<UnionAuthorizer>,
}

impl ChainAuthorizer {
    pub fn new(authorizers: Vec<UnionAuthorizer>) -> Self {
        Self { authorizers }
    }
}

impl Authorizer for ChainAuthorizer {
    fn authorize_request(&self, tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        for authorizer in self.authorizers.iter() {
            match authorizer.authorize_request(tx, req)? {
                AuthzResponse::Continue => continue,
                resp => return Ok(resp),
            }
        }

        Ok(AuthzResponse::Forbidden)
    }
}
