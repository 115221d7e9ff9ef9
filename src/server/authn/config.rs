use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

use super::password::DEFAULT_ROUNDS;
use super::token::config::TokenConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthnConfig {
    /// Password of the root user (id 0), set on every start.
    #[serde(default = "AuthnConfig::default_root_password")]
    pub root_password: String,

    /// PBKDF2 work factor for new password hashes. Stored hashes with fewer
    /// rounds are upgraded on the next successful login.
    #[serde(default = "AuthnConfig::default_password_rounds")]
    pub password_rounds: u32,

    #[serde(default = "TokenConfig::default")]
    pub token: TokenConfig,
}

impl CommonConfig for AuthnConfig {
    fn default() -> Self {
        Self {
            root_password: Self::default_root_password(),
            password_rounds: Self::default_password_rounds(),
            token: TokenConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.password_rounds < Self::MIN_PASSWORD_ROUNDS {
            bail!(
                "password_rounds should be at least {}",
                Self::MIN_PASSWORD_ROUNDS
            );
        }
        self.token.complete(ps)?;
        Ok(())
    }
}

impl AuthnConfig {
    const MIN_PASSWORD_ROUNDS: u32 = 1000;

    pub fn default_root_password() -> String {
        String::from("root")
    }

    pub fn default_password_rounds() -> u32 {
        DEFAULT_ROUNDS
    }
}
