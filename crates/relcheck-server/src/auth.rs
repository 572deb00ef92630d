use std::collections::HashMap;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use rand::rngs::OsRng;

use crate::config::ApiKeyEntry;

const KEY_PREFIX: &str = "relcheck";
const KEY_ID_LEN: usize = 8;
const SECRET_LEN: usize = 32;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("invalid api key format")]
    InvalidKeyFormat,

    #[error("unknown api key")]
    UnknownKey,

    #[error("api key has been revoked")]
    RevokedKey,

    #[error("internal authentication error: {0}")]
    Internal(String),
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub key_id: String,
}

/// Configured keys indexed by key id.
#[derive(Debug, Default)]
pub struct KeyTable {
    entries: HashMap<String, ApiKeyEntry>,
}

impl KeyTable {
    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| (e.key_id.clone(), e.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, key_id: &str) -> Option<&ApiKeyEntry> {
        self.entries.get(key_id)
    }
}

/// Splits `relcheck_<key_id>_<secret>` into its id and secret.
pub fn parse_api_key(raw_key: &str) -> Result<(&str, &str), AuthError> {
    let rest = raw_key
        .strip_prefix(KEY_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(AuthError::InvalidKeyFormat)?;
    let (key_id, secret) = rest.split_once('_').ok_or(AuthError::InvalidKeyFormat)?;
    if key_id.is_empty() || secret.is_empty() {
        return Err(AuthError::InvalidKeyFormat);
    }
    Ok((key_id, secret))
}

pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// A freshly generated key: the full bearer token plus its parts.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub full_key: String,
    pub key_id: String,
    pub secret: String,
}

pub fn generate_api_key() -> GeneratedKey {
    let key_id = random_token(KEY_ID_LEN);
    let secret = random_token(SECRET_LEN);
    GeneratedKey {
        full_key: format!("{KEY_PREFIX}_{key_id}_{secret}"),
        key_id,
        secret,
    }
}

pub fn authenticate(raw_key: &str, keys: &KeyTable) -> Result<AuthContext, AuthError> {
    let (key_id, secret) = parse_api_key(raw_key)?;

    let entry = keys.lookup(key_id).ok_or(AuthError::UnknownKey)?;

    if entry.revoked {
        return Err(AuthError::RevokedKey);
    }

    if !verify_secret(secret, &entry.key_hash)? {
        return Err(AuthError::UnknownKey);
    }

    Ok(AuthContext {
        key_id: entry.key_id.clone(),
    })
}
