use std::sync::Arc;

use anyhow::Result;

use crate::server::db::Transaction;

use super::matrix::PermissionMatrix;
use super::{Authorizer, AuthzRequest, AuthzResponse};

/// Grants whatever the caller's roles grant in the permission matrix.
///
/// Skips anonymous callers, they hold no role assignments.
pub struct RoleAuthorizer {
    matrix: Arc<PermissionMatrix>,
}

impl RoleAuthorizer {
    pub fn new(matrix: Arc<PermissionMatrix>) -> Self {
        Self { matrix }
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize_request(&self, tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse> {
        if req.user.is_anonymous() {
            return Ok(AuthzResponse::Continue);
        }

        if self
            .matrix
            .has_role_grant(tx, req.user.id, &req.resource, req.method)?
        {
            return Ok(AuthzResponse::Admin);
        }

        Ok(AuthzResponse::Continue)
    }
}
