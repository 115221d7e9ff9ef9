use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{debug, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::server::db::{DbError, Transaction};
use crate::time::is_expired;
use crate::types::document::{get_identity, ID_FIELD};

use super::{IssuedToken, TokenIdentity, TokenIssuer, TokenValidator};

/// Opaque random tokens backed by a session record. All trust derives from the
/// record lookup, so deleting the record revokes the token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    expiry: u64,
}

impl SessionToken {
    /// 384 bits from the OS random source.
    const TOKEN_BYTES: usize = 48;

    pub fn new(expiry: u64) -> Self {
        Self { expiry }
    }

    pub fn generate_token() -> String {
        let mut buf = [0u8; Self::TOKEN_BYTES];
        OsRng.fill_bytes(&mut buf);
        URL_SAFE_NO_PAD.encode(buf)
    }

    fn issue_with<F>(&self, tx: &dyn Transaction, user: i64, mut next_token: F) -> Result<IssuedToken>
    where
        F: FnMut() -> String,
    {
        loop {
            let token = next_token();
            if tx.get_session_by_token(&token)?.is_some() {
                warn!("Generated session token collides with a live session, regenerating");
                continue;
            }

            // The unique index still guards the window between lookup and insert
            match tx.create_session(user, &token) {
                Ok(session) => {
                    debug!("Issued session token for user {user}");
                    return Ok(IssuedToken {
                        token,
                        user,
                        session: Some(session),
                    });
                }
                Err(err) if DbError::is_conflict(&err) => {
                    warn!("Session token conflict on insert, regenerating");
                    continue;
                }
                Err(err) => return Err(err).context("create session"),
            }
        }
    }
}

impl TokenIssuer for SessionToken {
    fn issue_token(&self, tx: &dyn Transaction, user: i64) -> Result<IssuedToken> {
        self.issue_with(tx, user, Self::generate_token)
    }
}

impl TokenValidator for SessionToken {
    fn validate_token(&self, tx: &dyn Transaction, token: &str) -> Result<Option<TokenIdentity>> {
        if token.is_empty() {
            return Ok(None);
        }

        let session = match tx.get_session_by_token(token)? {
            Some(session) => session,
            None => return Ok(None),
        };

        let user = match get_identity(&session, "user") {
            Some(user) => user,
            None => return Ok(None),
        };
        let create_time = session
            .get("create_time")
            .and_then(|t| t.as_u64())
            .unwrap_or(0);
        if is_expired(create_time, self.expiry) {
            debug!("Session token of user {user} expired");
            return Ok(None);
        }

        Ok(Some(TokenIdentity {
            user,
            session: get_identity(&session, ID_FIELD),
        }))
    }
}
