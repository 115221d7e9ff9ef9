use anyhow::{Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use log::debug;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::sign::{Signer, Verifier};
use serde::{Deserialize, Serialize};

use crate::server::db::Transaction;
use crate::time::{current_timestamp, format_timestamp, is_expired, parse_timestamp};

use super::{IssuedToken, TokenIdentity, TokenIssuer, TokenValidator};

/// What a signed token carries, before base64 encoding.
#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    user_id: i64,
    login_time: String,
    signature: String,
}

/// Stateless tokens: `{user_id, login_time}` plus an RSA-SHA256 signature over
/// the zero-padded user id followed by the login time. Nothing is persisted,
/// so these tokens cannot be revoked before they expire.
#[derive(Clone)]
pub struct SignedToken {
    private_key: PKey<Private>,
    public_key: PKey<Public>,
    expiry: u64,
}

impl SignedToken {
    pub fn new(public_key: &[u8], private_key: &[u8], expiry: u64) -> Result<Self> {
        let public_key =
            PKey::public_key_from_pem(public_key).context("parse token public key")?;
        let private_key =
            PKey::private_key_from_pem(private_key).context("parse token private key")?;
        Ok(Self {
            private_key,
            public_key,
            expiry,
        })
    }

    fn message(user_id: i64, login_time: &str) -> String {
        format!("{user_id:010}{login_time}")
    }

    fn sign(&self, msg: &str) -> Result<String> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)?;
        signer.update(msg.as_bytes())?;
        let signature = signer.sign_to_vec()?;
        Ok(STANDARD.encode(signature))
    }

    fn verify(&self, msg: &str, signature: &str) -> Result<bool> {
        let signature = match STANDARD.decode(signature) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        let mut verifier = Verifier::new(MessageDigest::sha256(), &self.public_key)?;
        verifier.update(msg.as_bytes())?;
        Ok(verifier.verify(&signature).unwrap_or(false))
    }

    fn decode(token: &str) -> Option<SignedClaims> {
        let data = URL_SAFE_NO_PAD.decode(token).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

impl TokenIssuer for SignedToken {
    fn issue_token(&self, _tx: &dyn Transaction, user: i64) -> Result<IssuedToken> {
        let login_time = format_timestamp(current_timestamp());
        let signature = self
            .sign(&Self::message(user, &login_time))
            .context("sign token")?;

        let claims = SignedClaims {
            user_id: user,
            login_time,
            signature,
        };
        let data = serde_json::to_vec(&claims).context("encode token claims")?;
        Ok(IssuedToken {
            token: URL_SAFE_NO_PAD.encode(data),
            user,
            session: None,
        })
    }
}

impl TokenValidator for SignedToken {
    fn validate_token(&self, _tx: &dyn Transaction, token: &str) -> Result<Option<TokenIdentity>> {
        let claims = match Self::decode(token) {
            Some(claims) => claims,
            None => return Ok(None),
        };

        let msg = Self::message(claims.user_id, &claims.login_time);
        if !self.verify(&msg, &claims.signature)? {
            debug!("Signed token of user {} has a bad signature", claims.user_id);
            return Ok(None);
        }

        let login_time = match parse_timestamp(&claims.login_time) {
            Ok(time) => time,
            Err(_) => return Ok(None),
        };
        if is_expired(login_time, self.expiry) {
            debug!("Signed token of user {} expired", claims.user_id);
            return Ok(None);
        }

        Ok(Some(TokenIdentity {
            user: claims.user_id,
            session: None,
        }))
    }
}
