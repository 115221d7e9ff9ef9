use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

/// Token configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// `session` (opaque token, server-side session record, revocable) or
    /// `signed` (stateless RSA-signed token, not revocable).
    #[serde(default = "TokenConfig::default_scheme")]
    pub scheme: TokenScheme,

    /// Token lifetime in seconds, 0 means tokens never expire.
    /// Default: 30 days.
    #[serde(default = "TokenConfig::default_expiry")]
    pub expiry: u64,

    /// RSA public key (PEM) for the signed scheme.
    /// Default: {pki_path}/token_public.pem, generated when missing.
    #[serde(default = "TokenConfig::default_key_path")]
    pub public_key_path: String,

    /// RSA private key (PEM) for the signed scheme.
    /// Default: {pki_path}/token_private.pem, generated when missing.
    #[serde(default = "TokenConfig::default_key_path")]
    pub private_key_path: String,

    #[serde(skip)]
    pub generate_if_not_exists: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    #[serde(rename = "session")]
    Session,
    #[serde(rename = "signed")]
    Signed,
}

impl CommonConfig for TokenConfig {
    fn default() -> Self {
        Self {
            scheme: Self::default_scheme(),
            expiry: Self::default_expiry(),
            public_key_path: Self::default_key_path(),
            private_key_path: Self::default_key_path(),
            generate_if_not_exists: false,
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if matches!(self.scheme, TokenScheme::Session) {
            return Ok(());
        }

        self.public_key_path = expandenv("public_key_path", &self.public_key_path)?;
        self.private_key_path = expandenv("private_key_path", &self.private_key_path)?;

        if self.public_key_path.is_empty() && self.private_key_path.is_empty() {
            self.generate_if_not_exists = true;

            let path = ps.pki_path.join("token_public.pem");
            self.public_key_path = format!("{}", path.display());

            let path = ps.pki_path.join("token_private.pem");
            self.private_key_path = format!("{}", path.display());

            return Ok(());
        }

        if !self.public_key_path.is_empty() && !self.private_key_path.is_empty() {
            return Ok(());
        }

        bail!("both public_key_path and private_key_path should be set or both should be empty")
    }
}

impl TokenConfig {
    pub fn default_scheme() -> TokenScheme {
        TokenScheme::Session
    }

    pub fn default_expiry() -> u64 {
        60 * 60 * 24 * 30 // 30 days
    }

    pub fn default_key_path() -> String {
        String::new()
    }
}
