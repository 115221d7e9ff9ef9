pub mod config;
pub mod factory;
pub mod session;
pub mod signed;

use anyhow::Result;

use crate::server::db::Transaction;
use crate::types::document::Document;

use session::SessionToken;
use signed::SignedToken;

/// A freshly minted token bound to a user.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user: i64,
    /// The persisted session record, for schemes that keep one.
    pub session: Option<Document>,
}

/// The identity a valid token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user: i64,
    pub session: Option<i64>,
}

pub trait TokenIssuer {
    fn issue_token(&self, tx: &dyn Transaction, user: i64) -> Result<IssuedToken>;
}

pub trait TokenValidator {
    /// Returns `None` for any token that does not resolve to a live identity.
    /// Errors are reserved for store failures.
    fn validate_token(&self, tx: &dyn Transaction, token: &str) -> Result<Option<TokenIdentity>>;
}

#[derive(Clone)]
pub enum UnionToken {
    Session(SessionToken),
    Signed(SignedToken),
}

impl TokenIssuer for UnionToken {
    fn issue_token(&self, tx: &dyn Transaction, user: i64) -> Result<IssuedToken> {
        match self {
            UnionToken::Session(t) => t.issue_token(tx, user),
            UnionToken::Signed(t) => t.issue_token(tx, user),
        }
    }
}

impl TokenValidator for UnionToken {
    fn validate_token(&self, tx: &dyn Transaction, token: &str) -> Result<Option<TokenIdentity>> {
        match self {
            UnionToken::Session(t) => t.validate_token(tx, token),
            UnionToken::Signed(t) => t.validate_token(tx, token),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::db::Database;

    use super::*;

    pub fn run_token_tests<T>(token: &T, db: &Database)
    where
        T: TokenIssuer + TokenValidator,
    {
        for user in [0, 7, 8, 42, -1] {
            let issued = db.with_transaction(|tx| token.issue_token(tx, user)).unwrap();
            assert_eq!(issued.user, user);

            let identity = db
                .with_transaction(|tx| token.validate_token(tx, &issued.token))
                .unwrap()
                .unwrap();
            assert_eq!(identity.user, user);
        }

        for bad in ["", "x", "Zm9vYmFy", "{\"user_id\":7}"] {
            let identity = db.with_transaction(|tx| token.validate_token(tx, bad)).unwrap();
            assert!(identity.is_none());
        }
    }
}
