//! Argon2id password hashing.
//!
//! Every hash gets a fresh random 16-byte salt from the OS RNG and is stored
//! as a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`), so parameters
//! and salt travel with the hash. Verification compares digests in constant
//! time.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("stored password hash is invalid: {0}")]
    InvalidHash(String),
}

pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hashing(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::InvalidHash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_blocking(plain: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
}
