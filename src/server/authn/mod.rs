mod apikey;
mod header_token;
mod union;

pub mod chain;
pub mod config;
pub mod factory;
pub mod password;
pub mod token;

use actix_web::HttpRequest;
use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// The superuser. Granted everything without consulting any table.
pub const ROOT_ID: i64 = 0;

/// The pseudo-user every unauthenticated caller acts as.
pub const ANONYMOUS_ID: i64 = -1;

pub trait Authenticator: Send + Sync {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<AuthnUserInfo>,
    ) -> Result<AuthnResponse>;
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnUserInfo {
    /// User id, [`ANONYMOUS_ID`] when no user identity was presented.
    pub id: i64,
    /// Id of the session record the token resolved to, if the token scheme
    /// keeps sessions.
    pub session: Option<i64>,
    /// Set when the caller presented a configured API key instead of a token.
    pub api_key: Option<String>,
}

impl AuthnUserInfo {
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_ID,
            session: None,
            api_key: None,
        }
    }

    pub fn user(id: i64, session: Option<i64>) -> Self {
        Self {
            id,
            session,
            api_key: None,
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            id: ANONYMOUS_ID,
            session: None,
            api_key: Some(key.into()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_ID
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

/// Possible responses from an authentication step.
#[derive(Debug, Clone)]
pub enum AuthnResponse {
    /// Identity established
    Ok(AuthnUserInfo),
    /// Nothing this authenticator understands; defer to the next one
    Continue,
    /// Credentials were presented but are not valid
    Unauthenticated,
}

/// What the `Authorization` header carries.
#[derive(Debug, PartialEq, Eq)]
pub enum Credential {
    Missing,
    Malformed,
    Token(String),
}

/// Reads the raw token from the `Authorization` header. Both
/// `Basic base64(token:)` (token as user name, empty secret) and
/// `Bearer token` are accepted.
pub fn read_credential(req: &HttpRequest) -> Credential {
    let auth = match req.headers().get("Authorization") {
        Some(auth) => match auth.to_str() {
            Ok(auth) => auth.trim(),
            Err(_) => return Credential::Malformed,
        },
        None => return Credential::Missing,
    };
    if auth.is_empty() {
        return Credential::Missing;
    }

    let (scheme, value) = match auth.split_once(' ') {
        Some((scheme, value)) => (scheme, value.trim()),
        None => return Credential::Malformed,
    };
    if value.is_empty() {
        return Credential::Malformed;
    }

    match scheme.to_lowercase().as_str() {
        "bearer" => Credential::Token(value.to_string()),
        "basic" => {
            let decoded = match STANDARD.decode(value) {
                Ok(decoded) => decoded,
                Err(_) => return Credential::Malformed,
            };
            let decoded = match String::from_utf8(decoded) {
                Ok(decoded) => decoded,
                Err(_) => return Credential::Malformed,
            };
            let token = match decoded.split_once(':') {
                Some((token, _secret)) => token,
                None => decoded.as_str(),
            };
            if token.is_empty() {
                return Credential::Malformed;
            }
            Credential::Token(token.to_string())
        }
        _ => Credential::Malformed,
    }
}
