use std::collections::HashMap;

use actix_web::HttpRequest;
use anyhow::Result;
use log::debug;

use super::{read_credential, Authenticator, AuthnResponse, AuthnUserInfo, Credential};

/// Recognizes configured API keys presented in place of a session token.
pub struct ApiKeyAuthenticator {
    /// key -> display name
    keys: HashMap<String, String>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate_request(
        &self,
        req: &HttpRequest,
        user: Option<AuthnUserInfo>,
    ) -> Result<AuthnResponse> {
        if user.is_some() {
            return Ok(AuthnResponse::Continue);
        }

        let token = match read_credential(req) {
            Credential::Token(token) => token,
            _ => return Ok(AuthnResponse::Continue),
        };

        match self.keys.get(&token) {
            Some(name) => {
                debug!("Request authenticated with api key '{name}'");
                Ok(AuthnResponse::Ok(AuthnUserInfo::api_key(token)))
            }
            None => Ok(AuthnResponse::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_apikey_authenticator() {
        let keys = HashMap::from([("k-123".to_string(), "mailer".to_string())]);
        let auth = ApiKeyAuthenticator::new(keys);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer k-123"))
            .to_http_request();
        match auth.authenticate_request(&req, None).unwrap() {
            AuthnResponse::Ok(user) => {
                assert_eq!(user.api_key.as_deref(), Some("k-123"));
                assert!(user.is_anonymous());
            }
            other => panic!("unexpected response {other:?}"),
        }

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer some-session"))
            .to_http_request();
        assert!(matches!(
            auth.authenticate_request(&req, None).unwrap(),
            AuthnResponse::Continue
        ));

        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            auth.authenticate_request(&req, None).unwrap(),
            AuthnResponse::Continue
        ));
    }
}
