use std::{fs, io};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::rsa::generate_rsa_keys;

use super::config::{TokenConfig, TokenScheme};
use super::session::SessionToken;
use super::signed::SignedToken;
use super::UnionToken;

pub struct TokenFactory {
    scheme: TokenScheme,
    keys: Option<(Vec<u8>, Vec<u8>)>,
    expiry: u64,
}

impl TokenFactory {
    pub fn new(cfg: &TokenConfig) -> Result<Self> {
        if cfg.expiry == 0 {
            warn!("Token expiry is 0, tokens will never expire");
        }

        let keys = match cfg.scheme {
            TokenScheme::Session => None,
            TokenScheme::Signed => {
                warn!("Signed tokens can not be revoked before they expire, prefer the session scheme");
                Some(Self::load_keys(cfg)?)
            }
        };

        Ok(Self {
            scheme: cfg.scheme,
            keys,
            expiry: cfg.expiry,
        })
    }

    fn load_keys(cfg: &TokenConfig) -> Result<(Vec<u8>, Vec<u8>)> {
        match fs::read(&cfg.public_key_path) {
            Ok(public_key) => {
                let private_key =
                    fs::read(&cfg.private_key_path).context("read token private key")?;
                Ok((public_key, private_key))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && cfg.generate_if_not_exists => {
                info!("Public key and private key for token not found, generating with rsa");
                let (public_key, private_key) = generate_rsa_keys()?;
                fs::write(&cfg.public_key_path, &public_key)
                    .context("write token public key")?;
                fs::write(&cfg.private_key_path, &private_key)
                    .context("write token private key")?;
                Ok((public_key, private_key))
            }
            Err(err) => Err(err).context("read token public key"),
        }
    }

    pub fn build_token(&self) -> Result<UnionToken> {
        match self.scheme {
            TokenScheme::Session => Ok(UnionToken::Session(SessionToken::new(self.expiry))),
            TokenScheme::Signed => {
                let (public_key, private_key) = match self.keys {
                    Some(ref keys) => keys,
                    None => bail!("signed token scheme requires a key pair"),
                };
                let token = SignedToken::new(public_key, private_key, self.expiry)?;
                Ok(UnionToken::Signed(token))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CommonConfig;

    use super::*;

    #[test]
    fn test_factory() {
        let cfg = TokenConfig::default();
        let factory = TokenFactory::new(&cfg).unwrap();
        assert!(matches!(factory.build_token().unwrap(), UnionToken::Session(_)));

        let dir = std::env::temp_dir().join(format!("memberd_token_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut cfg = TokenConfig::default();
        cfg.scheme = TokenScheme::Signed;
        cfg.public_key_path = format!("{}", dir.join("public.pem").display());
        cfg.private_key_path = format!("{}", dir.join("private.pem").display());

        // Keys are only generated when the paths were defaulted
        assert!(TokenFactory::new(&cfg).is_err());

        cfg.generate_if_not_exists = true;
        let factory = TokenFactory::new(&cfg).unwrap();
        assert!(matches!(factory.build_token().unwrap(), UnionToken::Signed(_)));
        assert!(dir.join("private.pem").exists());

        // Second start reuses the generated pair
        let factory = TokenFactory::new(&cfg).unwrap();
        assert!(matches!(factory.build_token().unwrap(), UnionToken::Signed(_)));

        fs::remove_dir_all(&dir).unwrap();
    }
}
