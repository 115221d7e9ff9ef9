use std::sync::Arc;

use actix_web::HttpRequest;
use anyhow::Result;
use log::debug;

use crate::server::db::Database;

use super::token::TokenValidator;
use super::{read_credential, Authenticator, AuthnResponse, AuthnUserInfo, Credential};

/// Resolves the token in the `Authorization` header to a user. Unknown,
/// expired and malformed tokens all end up as `Unauthenticated`.
pub struct HeaderTokenAuthenticator<T: TokenValidator> {
    db: Arc<Database>,
    validator: T,
}

impl<T: TokenValidator> HeaderTokenAuthenticator<T> {
    pub fn new(db: Arc<Database>, validator: T) -> Self {
        Self { db, validator }
    }
}

impl<T: TokenValidator + Sync + Send> Authenticator for HeaderTokenAuthenticator<T> {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<AuthnUserInfo>,
    ) -> Result<AuthnResponse> {
        if let Some(user) = user {
            return Ok(AuthnResponse::Ok(user));
        }

        let token = match read_credential(req) {
            Credential::Missing => return Ok(AuthnResponse::Continue),
            Credential::Malformed => return Ok(AuthnResponse::Unauthenticated),
            Credential::Token(token) => token,
        };

        let identity = self
            .db
            .with_transaction(|tx| self.validator.validate_token(tx, &token))?;
        match identity {
            Some(identity) => Ok(AuthnResponse::Ok(AuthnUserInfo::user(
                identity.user,
                identity.session,
            ))),
            None => {
                debug!("Rejected unknown or expired token");
                Ok(AuthnResponse::Unauthenticated)
            }
        }
    }
}
