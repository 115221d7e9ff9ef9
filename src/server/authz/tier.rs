use std::sync::Arc;

use anyhow::Result;

use crate::server::db::Transaction;

use super::capability::{CapabilityRegistry, Tier};
use super::{Authorizer, AuthzRequest, AuthzResponse};

/// Applies the resource's visibility tiers. Methods outside every tier are
/// left to the end of the chain, which denies them.
pub struct TierAuthorizer {
    registry: Arc<CapabilityRegistry>,
}

impl TierAuthorizer {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }
}

impl Authorizer for TierAuthorizer {
    fn authorize_request(&self, _tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        let capability = self.registry.get(&req.resource)?;
        match capability.tier(req.method) {
            Some(Tier::Public) => Ok(AuthzResponse::Ok),
            Some(Tier::Registered) if !req.user.is_anonymous() => Ok(AuthzResponse::Ok),
            Some(Tier::Owner) => Ok(AuthzResponse::Owner),
            _ => Ok(AuthzResponse::Continue),
        }
    }
}
