use std::sync::Arc;

use log::{debug, error};

use crate::server::authn::AuthnUserInfo;
use crate::server::db::{Lookup, Transaction};
use crate::types::document::Document;
use crate::types::method::Method;
use crate::types::owner::OwnerFilter;

use super::capability::CapabilityRegistry;
use super::chain::ChainAuthorizer;
use super::matrix::PermissionMatrix;
use super::owner::will_be_owner;
use super::{Authorizer, AuthzError, AuthzRequest, AuthzResponse};

/// Per-request authorization state. Created by
/// [`RequestAuthorizer::authorize`] and passed to every later check of the
/// same request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: AuthnUserInfo,
    pub resource: String,
    pub method: Method,
    /// Granted through root, a role or an api key.
    pub is_resource_admin: bool,
    /// Granted only on the condition that the caller owns the object.
    pub requires_ownership: bool,
    /// Set by the first phase of a partial update.
    authorized_without_ownership: Option<bool>,
}

/// Combines the authorizer chain with ownership checks.
pub struct RequestAuthorizer {
    chain: ChainAuthorizer,
    registry: Arc<CapabilityRegistry>,
    matrix: Arc<PermissionMatrix>,
}

impl RequestAuthorizer {
    pub fn new(
        chain: ChainAuthorizer,
        registry: Arc<CapabilityRegistry>,
        matrix: Arc<PermissionMatrix>,
    ) -> Self {
        Self {
            chain,
            registry,
            matrix,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    /// Decides whether `user` may call `method` on `resource` at all. When
    /// the returned context requires ownership, the caller must follow up
    /// with the check matching the method before touching any data.
    pub fn authorize(
        &self,
        tx: &dyn Transaction,
        resource: &str,
        method: Method,
        user: AuthnUserInfo,
    ) -> Result<RequestContext, AuthzError> {
        let req = AuthzRequest {
            resource: resource.to_string(),
            method,
            user,
        };
        let resp = self.chain.authorize_request(tx, &req)?;
        debug!(
            "Authorize {} {} for user {}: {:?}",
            method, resource, req.user.id, resp
        );

        let (is_resource_admin, requires_ownership) = match resp {
            AuthzResponse::Admin => (true, false),
            AuthzResponse::Ok => (false, false),
            AuthzResponse::Owner if !req.user.is_anonymous() => (false, true),
            _ if req.user.is_anonymous() && req.user.api_key.is_none() => {
                return Err(AuthzError::Unauthenticated)
            }
            _ => return Err(AuthzError::Forbidden),
        };

        Ok(RequestContext {
            user: req.user,
            resource: req.resource,
            method,
            is_resource_admin,
            requires_ownership,
            authorized_without_ownership: None,
        })
    }

    /// Restriction for reads and deletes: everything, or only what the
    /// caller owns.
    pub fn read_lookup(&self, ctx: &RequestContext) -> Result<Lookup, AuthzError> {
        if !ctx.requires_ownership {
            return Ok(Lookup::all());
        }

        let capability = self.registry.get(&ctx.resource)?;
        if capability.owner_paths.is_empty() {
            error!(
                "{} {} requires ownership but resource has no owner field",
                ctx.method, ctx.resource
            );
            return Err(AuthzError::ConfigurationGap(format!(
                "resource '{}' has no owner field",
                ctx.resource
            )));
        }

        Ok(Lookup::owned_by(OwnerFilter {
            paths: capability.owner_paths.clone(),
            user: ctx.user.id,
        }))
    }

    /// Rejects creating a document the caller would not own.
    pub fn check_create(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        payload: &Document,
    ) -> Result<(), AuthzError> {
        if !ctx.requires_ownership {
            return Ok(());
        }

        let capability = self.registry.get(&ctx.resource)?;
        if capability.owner_paths.is_empty() {
            error!(
                "{} {} requires ownership but resource has no owner field",
                ctx.method, ctx.resource
            );
        }
        will_be_owner(tx, &capability.owner_paths, payload, ctx.user.id)
    }

    /// Full replacement: the new body must belong to the caller, and so must
    /// the document being replaced.
    pub fn check_replace(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        payload: &Document,
    ) -> Result<Lookup, AuthzError> {
        self.check_create(tx, ctx, payload)?;
        self.read_lookup(ctx)
    }

    /// First phase of a partial update, run before the target is fetched.
    pub fn begin_patch(&self, ctx: &mut RequestContext) -> Result<Lookup, AuthzError> {
        ctx.authorized_without_ownership = Some(!ctx.requires_ownership);
        self.read_lookup(ctx)
    }

    /// Second phase of a partial update, run on the target merged with the
    /// changes. Stops an owner from handing the document to someone else.
    pub fn finish_patch(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        merged: &Document,
    ) -> Result<(), AuthzError> {
        match ctx.authorized_without_ownership {
            Some(true) => Ok(()),
            Some(false) => self.check_create(tx, ctx, merged),
            None => {
                error!("Patch of {} finished without its first phase", ctx.resource);
                Err(AuthzError::ConfigurationGap(String::from(
                    "patch ownership checked before the read phase",
                )))
            }
        }
    }
}
