use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use pbkdf2::pbkdf2_hmac_array;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::server::db::Database;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

/// Work factor of newly hashed credentials.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Work factor assumed for hashes stored without an explicit one
/// (`<salt>$<hash>`).
const LEGACY_ROUNDS: u32 = 100_000;

/// Outcome of checking a plaintext password against a stored hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// A fresh hash of the same password at the current work factor, present
    /// only for valid passwords whose stored hash is outdated.
    pub rehash: Option<String>,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            rehash: None,
        }
    }
}

struct StoredHash {
    rounds: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
    legacy: bool,
}

/// Salted, iterated PBKDF2-HMAC-SHA256 password hashing.
///
/// Stored form: `pbkdf2_sha256$<rounds>$<base64 salt>$<base64 hash>`.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    rounds: u32,
}

impl CredentialVerifier {
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    pub fn hash(&self, plaintext: &str) -> String {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        let hash = pbkdf2_hmac_array::<Sha256, HASH_LENGTH>(plaintext.as_bytes(), &salt, self.rounds);
        format!(
            "{ALGORITHM}${}${}${}",
            self.rounds,
            STANDARD.encode(salt),
            STANDARD.encode(hash)
        )
    }

    /// Checks `plaintext` against `stored`. A missing hash, a missing password
    /// and an unparsable hash are all plainly invalid.
    pub fn verify(&self, stored: Option<&str>, plaintext: Option<&str>) -> Verification {
        let (stored, plaintext) = match (stored, plaintext) {
            (Some(stored), Some(plaintext)) => (stored, plaintext),
            _ => return Verification::invalid(),
        };

        let parsed = match Self::parse(stored) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("Stored credential is not usable: {err:#}");
                return Verification::invalid();
            }
        };

        let computed =
            pbkdf2_hmac_array::<Sha256, HASH_LENGTH>(plaintext.as_bytes(), &parsed.salt, parsed.rounds);
        let valid = parsed.hash.len() == computed.len()
            && openssl::memcmp::eq(&parsed.hash, &computed);
        if !valid {
            return Verification::invalid();
        }

        let rehash = if parsed.legacy || parsed.rounds < self.rounds {
            Some(self.hash(plaintext))
        } else {
            None
        };
        Verification {
            valid: true,
            rehash,
        }
    }

    fn parse(stored: &str) -> Result<StoredHash> {
        let parts: Vec<&str> = stored.split('$').collect();
        let (rounds, salt, hash, legacy) = match parts.as_slice() {
            [algorithm, rounds, salt, hash] => {
                if *algorithm != ALGORITHM {
                    bail!("unsupported algorithm '{algorithm}'");
                }
                let rounds: u32 = rounds.parse().context("parse rounds")?;
                (rounds, *salt, *hash, false)
            }
            [salt, hash] => (LEGACY_ROUNDS, *salt, *hash, true),
            _ => bail!("unknown hash layout"),
        };
        if rounds == 0 {
            bail!("zero rounds");
        }

        let salt = STANDARD.decode(salt).context("decode salt")?;
        let hash = STANDARD.decode(hash).context("decode hash")?;
        if salt.is_empty() || hash.is_empty() {
            bail!("empty salt or hash");
        }
        Ok(StoredHash {
            rounds,
            salt,
            hash,
            legacy,
        })
    }
}

/// Stores an upgraded hash for `user` in a transaction of its own. Must only
/// be called once the caller's own transaction has been closed. Failures are
/// logged and otherwise ignored; the old hash keeps working.
pub fn schedule_rehash(db: Arc<Database>, user: i64, hash: String) {
    let store = move || {
        let result = db.with_transaction(|tx| tx.update_user_password(user, &hash));
        match result {
            Ok(()) => debug!("Upgraded password hash of user {user}"),
            Err(err) => warn!("Upgrade password hash of user {user} failed: {err:#}"),
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(store);
        }
        Err(_) => store(),
    }
}
