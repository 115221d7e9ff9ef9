use std::collections::HashMap;
use std::sync::Arc;

use actix_web::web::Query;
use actix_web::HttpRequest;
use anyhow::Result;
use log::{debug, error, info};
use serde_json::Value;

use crate::server::authn::chain::ChainAuthenticator;
use crate::server::authn::token::UnionToken;
use crate::server::authn::{Authenticator, AuthnResponse, AuthnUserInfo};
use crate::server::authz::capability::Tier;
use crate::server::authz::guard::{RequestAuthorizer, RequestContext};
use crate::server::authz::redact::FieldRedactor;
use crate::server::authz::AuthzError;
use crate::server::db::{Database, DbError, Lookup, Transaction};
use crate::server::response::{self, Response};
use crate::types::document::{merge_document, Document, AUTHOR_FIELD, ID_FIELD};
use crate::types::method::Method;

use super::{Handler, RequestError};

/// Resource name of the permission matrix introspection endpoint.
pub const ROLES: &str = "roles";

/// Generic resource endpoint: `/api/{resource}` and `/api/{resource}/{id}`.
pub struct ApiHandler {
    authn: ChainAuthenticator<UnionToken>,
    authz: RequestAuthorizer,
    redactor: FieldRedactor,
    db: Arc<Database>,
}

impl ApiHandler {
    pub fn new(
        authn: ChainAuthenticator<UnionToken>,
        authz: RequestAuthorizer,
        redactor: FieldRedactor,
        db: Arc<Database>,
    ) -> Self {
        Self {
            authn,
            authz,
            redactor,
            db,
        }
    }

    fn split_api_path(path: &str) -> Result<(String, Option<String>), &'static str> {
        let path = path.trim_end_matches('/');
        let parts: Vec<&str> = path.split('/').collect();

        match parts.as_slice() {
            [] => Err("empty path"),
            [""] => Err("empty resource"),
            [resource] => Ok((resource.to_string(), None)),
            [resource, id] => Ok((resource.to_string(), Some(id.to_string()))),
            _ => Err("invalid path format"),
        }
    }

    /// Establishes the caller. Credentials that do not check out are only
    /// tolerated on public methods, where the caller continues as anonymous.
    fn authenticate(
        &self,
        req: &HttpRequest,
        resource: &str,
        method: Method,
    ) -> Result<AuthnUserInfo, Response> {
        let resp = match self.authn.authenticate_request(req, None) {
            Ok(resp) => resp,
            Err(e) => {
                error!("Authentication failed: {e:#}");
                return Err(Response::error(response::AUTHN_ERROR));
            }
        };

        match resp {
            AuthnResponse::Ok(user) => Ok(user),
            AuthnResponse::Continue => Ok(AuthnUserInfo::anonymous()),
            AuthnResponse::Unauthenticated => {
                let public = self
                    .authz
                    .registry()
                    .get(resource)
                    .map(|capability| capability.tier(method) == Some(Tier::Public))
                    .unwrap_or(false);
                if public {
                    debug!("Invalid token on public {method} {resource}, continue as anonymous");
                    return Ok(AuthnUserInfo::anonymous());
                }
                Err(Response::unauthenticated("Invalid token"))
            }
        }
    }

    fn parse_document(body: Option<Vec<u8>>) -> Result<Document, Response> {
        let body = match body {
            Some(body) if !body.is_empty() => body,
            _ => return Err(Response::bad_request("Request body is empty or too large")),
        };
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) => Err(Response::bad_request("Request body must be a json object")),
            Err(_) => Err(Response::bad_request("Invalid json body")),
        }
    }

    fn error_response(err: anyhow::Error) -> Response {
        if let Some(err) = err.downcast_ref::<AuthzError>() {
            return match err {
                AuthzError::Unauthenticated => Response::unauthenticated("Login required"),
                AuthzError::Forbidden | AuthzError::UnresolvableOwnership(_) => {
                    Response::forbidden()
                }
                AuthzError::ConfigurationGap(reason) => {
                    error!("Denied by configuration gap: {reason}");
                    Response::forbidden()
                }
                AuthzError::Store(e) => {
                    error!("Authorization store failure: {e:#}");
                    Response::error(response::STORE_ERROR)
                }
            };
        }

        if DbError::is_not_found(&err) {
            return Response::not_found();
        }
        match err.downcast_ref::<RequestError>() {
            Some(RequestError::NotFound) => Response::not_found(),
            Some(RequestError::BadRequest(msg)) => Response::bad_request(msg),
            None => {
                error!("Handle api request failed: {err:#}");
                Response::error(response::STORE_ERROR)
            }
        }
    }

    /// Fetches the target of an item request through `lookup`. An object that
    /// exists but is filtered out by ownership is reported as forbidden.
    fn fetch_target(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        id: i64,
        lookup: &Lookup,
    ) -> Result<Document> {
        if let Some(doc) = tx.get_document(&ctx.resource, id, lookup)? {
            return Ok(doc);
        }
        if lookup.owner.is_some() && tx.is_document_exists(&ctx.resource, id)? {
            debug!("User {} does not own {}/{id}", ctx.user.id, ctx.resource);
            return Err(AuthzError::Forbidden.into());
        }
        Err(RequestError::NotFound.into())
    }

    fn list(&self, tx: &dyn Transaction, ctx: &RequestContext) -> Result<Response> {
        let lookup = self.authz.read_lookup(ctx)?;
        let docs = tx.list_documents(&ctx.resource, &lookup)?;
        let docs: Vec<Document> = docs
            .into_iter()
            .map(|doc| self.redactor.filter_outbound(ctx, doc))
            .collect();
        Ok(Response::json(docs))
    }

    fn get(&self, tx: &dyn Transaction, ctx: &RequestContext, id: i64) -> Result<Response> {
        let lookup = self.authz.read_lookup(ctx)?;
        let doc = self.fetch_target(tx, ctx, id, &lookup)?;
        Ok(Response::json(self.redactor.filter_outbound(ctx, doc)))
    }

    fn create(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        mut doc: Document,
    ) -> Result<Response> {
        doc.remove(ID_FIELD);
        self.redactor.check_inbound(ctx, &doc, None)?;
        self.authz.check_create(tx, ctx, &doc)?;

        doc.insert(AUTHOR_FIELD.to_string(), Value::from(ctx.user.id));
        let created = tx.create_document(&ctx.resource, &doc)?;
        info!(
            "User {} created {}/{}",
            ctx.user.id, ctx.resource, created[ID_FIELD]
        );
        Ok(Response::json(self.redactor.filter_outbound(ctx, created)))
    }

    fn replace(
        &self,
        tx: &dyn Transaction,
        ctx: &RequestContext,
        id: i64,
        mut doc: Document,
    ) -> Result<Response> {
        doc.insert(ID_FIELD.to_string(), Value::from(id));
        let lookup = self.authz.check_replace(tx, ctx, &doc)?;
        let original = self.fetch_target(tx, ctx, id, &lookup)?;
        self.redactor.check_inbound(ctx, &doc, Some(&original))?;

        doc.remove(ID_FIELD);
        doc.insert(AUTHOR_FIELD.to_string(), Value::from(ctx.user.id));
        let replaced = tx.replace_document(&ctx.resource, id, &doc)?;
        info!("User {} replaced {}/{id}", ctx.user.id, ctx.resource);
        Ok(Response::json(self.redactor.filter_outbound(ctx, replaced)))
    }

    fn update(
        &self,
        tx: &dyn Transaction,
        ctx: &mut RequestContext,
        id: i64,
        mut changes: Document,
    ) -> Result<Response> {
        changes.remove(ID_FIELD);
        changes.remove(AUTHOR_FIELD);

        let lookup = self.authz.begin_patch(ctx)?;
        let original = self.fetch_target(tx, ctx, id, &lookup)?;
        self.redactor.check_inbound(ctx, &changes, Some(&original))?;

        let merged = merge_document(&original, &changes);
        self.authz.finish_patch(tx, ctx, &merged)?;

        let updated = tx.update_document(&ctx.resource, id, &changes)?;
        info!("User {} updated {}/{id}", ctx.user.id, ctx.resource);
        Ok(Response::json(self.redactor.filter_outbound(ctx, updated)))
    }

    fn delete(&self, tx: &dyn Transaction, ctx: &RequestContext, id: i64) -> Result<Response> {
        let lookup = self.authz.read_lookup(ctx)?;
        self.fetch_target(tx, ctx, id, &lookup)?;
        tx.delete_document(&ctx.resource, id)?;
        info!("User {} deleted {}/{id}", ctx.user.id, ctx.resource);
        Ok(Response::ok())
    }

    fn handle_roles(&self, method: Method, id: Option<i64>, user: AuthnUserInfo) -> Response {
        if method != Method::Get {
            return Response::method_not_allowed();
        }
        if id.is_some() {
            return Response::bad_request("roles does not take an id");
        }

        let result = self
            .db
            .with_transaction(|tx| Ok(self.authz.authorize(tx, ROLES, method, user)?));
        match result {
            Ok(ctx) if ctx.requires_ownership => Response::forbidden(),
            Ok(_) => Response::json(self.authz.matrix().introspect()),
            Err(e) => Self::error_response(e),
        }
    }
}

impl Handler for ApiHandler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let method = match Method::from_http(req.method()) {
            Some(method) => method,
            None => return Response::method_not_allowed(),
        };

        let (resource, id) = match Self::split_api_path(path) {
            Ok((resource, id)) => (resource, id),
            Err(msg) => return Response::bad_request(msg),
        };
        if !self.authz.registry().contains(&resource) {
            return Response::not_found();
        }
        let id = match id {
            Some(id) => match id.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => return Response::bad_request("Invalid resource id"),
            },
            None => None,
        };

        match (method, id) {
            (Method::Get, _) => {}
            (Method::Post, Some(_)) => return Response::bad_request("Resource id is not allowed"),
            (Method::Post, None) => {}
            (_, None) => return Response::bad_request("Resource id is required"),
            (_, Some(_)) => {}
        }

        let user = match self.authenticate(&req, &resource, method) {
            Ok(user) => user,
            Err(resp) => return resp,
        };

        if resource == ROLES {
            return self.handle_roles(method, id, user);
        }

        if method == Method::Get {
            let query = Query::<HashMap<String, String>>::from_query(req.query_string())
                .map(|q| q.into_inner())
                .unwrap_or_default();
            let projection = query.get("projection").map(String::as_str);
            if let Err(e) = self.redactor.check_projection(&resource, projection) {
                return Self::error_response(e.into());
            }
        }

        let doc = match method {
            Method::Post | Method::Put | Method::Patch => match Self::parse_document(body) {
                Ok(mut doc) => {
                    // Hash before the transaction, hashing must not hold the store lock
                    self.redactor.seal_credentials(&resource, &mut doc);
                    Some(doc)
                }
                Err(resp) => return resp,
            },
            _ => None,
        };

        let result = self.db.with_transaction(|tx| {
            let mut ctx = self.authz.authorize(tx, &resource, method, user)?;
            match (method, id, doc) {
                (Method::Get, None, _) => self.list(tx, &ctx),
                (Method::Get, Some(id), _) => self.get(tx, &ctx, id),
                (Method::Post, None, Some(doc)) => self.create(tx, &ctx, doc),
                (Method::Put, Some(id), Some(doc)) => self.replace(tx, &ctx, id, doc),
                (Method::Patch, Some(id), Some(doc)) => self.update(tx, &mut ctx, id, doc),
                (Method::Delete, Some(id), _) => self.delete(tx, &ctx, id),
                _ => Err(RequestError::BadRequest(String::from("Invalid request")).into()),
            }
        });

        match result {
            Ok(resp) => resp,
            Err(e) => Self::error_response(e),
        }
    }
}
