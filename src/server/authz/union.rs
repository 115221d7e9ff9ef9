use anyhow::Result;

use crate::server::db::Transaction;

use super::apikey::ApiKeyAuthorizer;
use super::role::RoleAuthorizer;
use super::root::RootAuthorizer;
use super::tier::TierAuthorizer;
use super::{Authorizer, AuthzRequest, AuthzResponse};

pub enum UnionAuthorizer {
    ApiKey(ApiKeyAuthorizer),
    Root(RootAuthorizer),
    Role(RoleAuthorizer),
    Tier(TierAuthorizer),
}

impl Authorizer for UnionAuthorizer {
    fn authorize_request(&self, tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        match self {
            UnionAuthorizer::ApiKey(a) => a.authorize_request(tx, req),
            UnionAuthorizer::Root(r) => r.authorize_request(tx, req),
            UnionAuthorizer::Role(r) => r.authorize_request(tx, req),
            UnionAuthorizer::Tier(t) => t.authorize_request(tx, req),
        }
    }
}
