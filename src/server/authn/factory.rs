use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};

use crate::server::db::Database;

use super::apikey::ApiKeyAuthenticator;
use super::chain::ChainAuthenticator;
use super::config::AuthnConfig;
use super::header_token::HeaderTokenAuthenticator;
use super::password::CredentialVerifier;
use super::token::UnionToken;
use super::union::UnionAuthenticator;

/// Builds the authentication chain:
/// 1. API key authentication (if any key is configured)
/// 2. Header token authentication (always enabled)
pub struct AuthnFactory<'a> {
    cfg: &'a AuthnConfig,
}

impl<'a> AuthnFactory<'a> {
    pub fn new(cfg: &'a AuthnConfig) -> Self {
        if cfg.root_password == AuthnConfig::default_root_password() {
            warn!("Using default root password IS DANGEROUS, please change it in production");
        }
        Self { cfg }
    }

    pub fn build_verifier(&self) -> CredentialVerifier {
        CredentialVerifier::new(self.cfg.password_rounds)
    }

    /// `api_keys` maps each configured key to its display name.
    pub fn build_authenticator(
        &self,
        api_keys: HashMap<String, String>,
        token: UnionToken,
        db: Arc<Database>,
    ) -> ChainAuthenticator<UnionToken> {
        let mut authenticators = Vec::new();

        if api_keys.is_empty() {
            info!("No api key configured, api key authentication disabled");
        } else {
            info!("Api key authentication enabled with {} key(s)", api_keys.len());
            let apikey = ApiKeyAuthenticator::new(api_keys);
            authenticators.push(UnionAuthenticator::ApiKey(apikey));
        }

        let header_token = HeaderTokenAuthenticator::new(db, token);
        authenticators.push(UnionAuthenticator::HeaderToken(header_token));

        ChainAuthenticator::new(authenticators)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use crate::config::CommonConfig;
    use crate::server::authn::token::session::SessionToken;
    use crate::server::authn::token::TokenIssuer;
    use crate::server::authn::{Authenticator, AuthnResponse, AuthnUserInfo};

    use super::*;

    fn get_chain_length(chain: &ChainAuthenticator<UnionToken>) -> usize {
        chain.len()
    }

    #[test]
    fn test_factory() {
        let db = Arc::new(Database::new_test());
        let token = UnionToken::Session(SessionToken::new(3600));
        let cfg = AuthnConfig::default();
        let factory = AuthnFactory::new(&cfg);

        let chain = factory.build_authenticator(HashMap::new(), token.clone(), db.clone());
        assert_eq!(get_chain_length(&chain), 1);

        let keys = HashMap::from([("k-1".to_string(), "reporting".to_string())]);
        let chain = factory.build_authenticator(keys, token.clone(), db.clone());
        assert_eq!(get_chain_length(&chain), 2);

        // No credential: nobody established
        let req = TestRequest::default().to_http_request();
        let resp = chain.authenticate_request(&req, None).unwrap();
        assert!(matches!(resp, AuthnResponse::Continue));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer k-1"))
            .to_http_request();
        match chain.authenticate_request(&req, None).unwrap() {
            AuthnResponse::Ok(user) => assert_eq!(user, AuthnUserInfo::api_key("k-1")),
            resp => panic!("unexpected response {resp:?}"),
        }

        let issued = db.with_transaction(|tx| token.issue_token(tx, 7)).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", issued.token)))
            .to_http_request();
        match chain.authenticate_request(&req, None).unwrap() {
            AuthnResponse::Ok(user) => assert_eq!(user.id, 7),
            resp => panic!("unexpected response {resp:?}"),
        }

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer nope"))
            .to_http_request();
        let resp = chain.authenticate_request(&req, None).unwrap();
        assert!(matches!(resp, AuthnResponse::Unauthenticated));

        let verifier = factory.build_verifier();
        let hash = verifier.hash("pw");
        assert!(verifier.verify(Some(&hash), Some("pw")).valid);
    }
}
