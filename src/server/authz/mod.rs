mod apikey;
mod root;
mod role;
mod tier;
mod union;

pub mod capability;
pub mod chain;
pub mod config;
pub mod factory;
pub mod guard;
pub mod matrix;
pub mod owner;
pub mod redact;

use anyhow::Result;
use thiserror::Error;

use crate::types::method::Method;

use super::authn::AuthnUserInfo;
use super::db::Transaction;

pub trait Authorizer: Send + Sync {
    fn authorize_request(&self, tx: &dyn Transaction, req: &AuthzRequest) -> Result<AuthzResponse>;
}

#[derive(Debug, Clone)]
pub struct AuthzRequest {
    pub resource: String,
    pub method: Method,
    pub user: AuthnUserInfo,
}

/// Possible responses from an authorization check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthzResponse {
    /// Granted by root, a role or an api key; no ownership applies
    Admin,
    /// Granted by the resource's public or registered tier
    Ok,
    /// Granted only if the caller owns the object
    Owner,
    /// Defers decision to next authorizer in chain
    Continue,
    /// Access is denied
    Forbidden,
}

/// Why a request was not authorized.
///
/// Only `Unauthenticated` and `Forbidden` are visible to clients. The other
/// kinds are reported as `Forbidden` (or a server error for `Store`) but
/// logged on their own.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("unresolvable ownership: {0}")]
    UnresolvableOwnership(String),

    #[error("configuration gap: {0}")]
    ConfigurationGap(String),

    #[error("store failure: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for AuthzError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AuthzError>() {
            Ok(err) => err,
            Err(err) => AuthzError::Store(err),
        }
    }
}
