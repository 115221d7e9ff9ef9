use actix_web::HttpRequest;
use anyhow::Result;

use super::apikey::ApiKeyAuthenticator;
use super::header_token::HeaderTokenAuthenticator;
use super::token::TokenValidator;
use super::{Authenticator, AuthnResponse, AuthnUserInfo};

pub enum UnionAuthenticator<T: TokenValidator> {
    ApiKey(ApiKeyAuthenticator),
    HeaderToken(HeaderTokenAuthenticator<T>),
}

impl<T: TokenValidator + Sync + Send> Authenticator for UnionAuthenticator<T> {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<AuthnUserInfo>,
    ) -> Result<AuthnResponse> {
        match self {
            UnionAuthenticator::ApiKey(auth) => auth.authenticate_request(req, user),
            UnionAuthenticator::HeaderToken(auth) => auth.authenticate_request(req, user),
        }
    }
}
