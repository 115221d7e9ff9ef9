use std::sync::Arc;

use actix_web::web::Query;
use actix_web::HttpRequest;
use anyhow::Result;
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::server::authn::password::{schedule_rehash, CredentialVerifier};
use crate::server::authn::token::{IssuedToken, TokenIssuer, UnionToken};
use crate::server::authn::ROOT_ID;
use crate::server::authz::redact::PASSWORD_FIELD;
use crate::server::db::{Database, Lookup, Transaction, USERS};
use crate::server::response::{self, Response};
use crate::types::document::{get_identity, Document, ID_FIELD};
use crate::types::session::{LoginRequest, LoginResponse};

use super::Handler;

/// Login: exchanges a username (or email) and password for a token.
pub struct LoginHandler {
    token: UnionToken,
    verifier: CredentialVerifier,
    db: Arc<Database>,
}

impl LoginHandler {
    const ROOT_NAME: &'static str = "root";

    pub fn new(token: UnionToken, verifier: CredentialVerifier, db: Arc<Database>) -> Self {
        Self {
            token,
            verifier,
            db,
        }
    }

    fn parse_login(req: &HttpRequest, body: Option<Vec<u8>>) -> Result<LoginRequest, &'static str> {
        let body = match body {
            Some(body) if !body.is_empty() => body,
            _ => return Err("Login body is required"),
        };

        let content_type = req
            .headers()
            .get("Content-Type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");
        if content_type.contains("json") {
            return serde_json::from_slice(&body).map_err(|_| "Invalid login json");
        }

        let form = std::str::from_utf8(&body).map_err(|_| "Invalid login form")?;
        Query::<LoginRequest>::from_query(form)
            .map(|q| q.into_inner())
            .map_err(|_| "Invalid login form")
    }

    fn find_user(tx: &dyn Transaction, name: &str) -> Result<Option<Document>> {
        for field in ["username", "email"] {
            let filters = [(field.to_string(), Value::from(name))];
            let mut users = tx.find_documents(USERS, &filters)?;
            match users.len() {
                0 => continue,
                1 => return Ok(users.pop()),
                n => {
                    warn!("Login name '{name}' matches {n} users by {field}, refusing");
                    return Ok(None);
                }
            }
        }

        if name == Self::ROOT_NAME {
            return tx.get_document(USERS, ROOT_ID, &Lookup::all());
        }
        Ok(None)
    }

    /// Looks up the id and stored password hash of the user `name` refers to.
    fn credentials(&self, name: &str) -> Result<Option<(i64, Option<String>)>> {
        self.db.with_transaction(|tx| {
            let user = match Self::find_user(tx, name)? {
                Some(user) => user,
                None => {
                    debug!("Login for unknown user '{name}'");
                    return Ok(None);
                }
            };
            let stored = user
                .get(PASSWORD_FIELD)
                .and_then(Value::as_str)
                .map(String::from);
            Ok(get_identity(&user, ID_FIELD).map(|id| (id, stored)))
        })
    }

    fn login(&self, login: &LoginRequest) -> Result<Option<(IssuedToken, Option<String>)>> {
        let name = match login.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };
        let (id, stored) = match self.credentials(name)? {
            Some(credentials) => credentials,
            None => return Ok(None),
        };

        // Hashing must not hold the store lock
        let verification = self
            .verifier
            .verify(stored.as_deref(), login.password.as_deref());
        if !verification.valid {
            debug!("Login for user {id} with a wrong password");
            return Ok(None);
        }

        self.db.with_transaction(|tx| {
            if !tx.is_document_exists(USERS, id)? {
                debug!("User {id} was removed during login");
                return Ok(None);
            }
            let issued = self.token.issue_token(tx, id)?;
            Ok(Some((issued, verification.rehash)))
        })
    }
}

impl Handler for LoginHandler {
    fn handle(&self, _path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let login = match Self::parse_login(&req, body) {
            Ok(login) => login,
            Err(msg) => return Response::bad_request(msg),
        };

        let (issued, rehash) = match self.login(&login) {
            Ok(Some(result)) => result,
            Ok(None) => return Response::unauthenticated(response::INVALID_CREDENTIALS),
            Err(e) => {
                error!("Login failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };

        // The login transaction is closed here, the upgrade takes its own
        if let Some(hash) = rehash {
            schedule_rehash(self.db.clone(), issued.user, hash);
        }

        info!("User {} logged in", issued.user);
        let session = issued.session.as_ref();
        Response::json(LoginResponse {
            id: session.and_then(|s| get_identity(s, ID_FIELD)),
            user: issued.user,
            token: issued.token,
            create_time: session
                .and_then(|s| s.get("create_time"))
                .and_then(Value::as_u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use serde_json::json;

    use crate::server::authn::token::session::SessionToken;

    use super::*;

    const ROUNDS: u32 = 1000;

    fn setup() -> LoginHandler {
        let db = Arc::new(Database::new_test());
        let verifier = CredentialVerifier::new(ROUNDS);
        let alice = json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": verifier.hash("alice-pw"),
        });
        let nopw = json!({"username": "ldap-only"});
        db.with_transaction(|tx| {
            tx.create_document_with_id(USERS, 7, alice.as_object().unwrap())?;
            tx.create_document_with_id(USERS, 8, nopw.as_object().unwrap())?;
            Ok(())
        })
        .unwrap();

        let token = UnionToken::Session(SessionToken::new(3600));
        LoginHandler::new(token, verifier, db)
    }

    fn login(handler: &LoginHandler, body: Value) -> Response {
        let req = TestRequest::post()
            .insert_header(("Content-Type", "application/json"))
            .to_http_request();
        handler.handle("", req, Some(serde_json::to_vec(&body).unwrap()))
    }

    #[test]
    fn test_login() {
        let handler = setup();

        let resp = login(&handler, json!({"username": "alice", "password": "alice-pw"}));
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = login(&handler, json!({"username": "alice@example.com", "password": "alice-pw"}));
        assert_eq!(resp.status(), StatusCode::OK);

        let sessions = handler
            .db
            .with_transaction(|tx| tx.find_documents("sessions", &[("user".to_string(), json!(7))]))
            .unwrap();
        assert_eq!(sessions.len(), 2);

        for body in [
            json!({"username": "alice", "password": "wrong"}),
            json!({"username": "alice"}),
            json!({"username": "mallory", "password": "alice-pw"}),
            json!({"username": "ldap-only", "password": ""}),
            json!({"password": "alice-pw"}),
        ] {
            assert_eq!(login(&handler, body).status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_credentials() {
        let handler = setup();

        let (id, stored) = handler.credentials("alice@example.com").unwrap().unwrap();
        assert_eq!(id, 7);
        assert!(handler.verifier.verify(stored.as_deref(), Some("alice-pw")).valid);

        assert_eq!(handler.credentials("ldap-only").unwrap(), Some((8, None)));
        assert_eq!(handler.credentials("mallory").unwrap(), None);
    }

    #[test]
    fn test_login_form() {
        let handler = setup();
        let req = TestRequest::post()
            .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
            .to_http_request();
        let body = b"username=alice&password=alice-pw".to_vec();
        assert_eq!(handler.handle("", req, Some(body)).status(), StatusCode::OK);

        let req = TestRequest::post().to_http_request();
        assert_eq!(handler.handle("", req, None).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_root_fallback() {
        let handler = setup();
        let root = json!({"password": handler.verifier.hash("root-pw")});
        handler
            .db
            .with_transaction(|tx| tx.create_document_with_id(USERS, ROOT_ID, root.as_object().unwrap()))
            .unwrap();

        let resp = login(&handler, json!({"username": "root", "password": "root-pw"}));
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
