//! Password hashing and verification.
//!
//! Argon2id with a random salt per hash, stored as a PHC string. Verification
//! re-derives with the stored parameters and compares in constant time.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// PHC algorithm identifiers `verify_password` can check.
const ARGON2_ALGORITHMS: [&str; 3] = ["argon2id", "argon2i", "argon2d"];

#[derive(Debug)]
pub enum CredentialError {
    Hash(password_hash::Error),
    /// The stored value is not a PHC hash string.
    MalformedHash(password_hash::Error),
    Verify(password_hash::Error),
}

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash(err) => write!(f, "password hashing failed: {err}"),
            Self::MalformedHash(err) => write!(f, "stored password hash is malformed: {err}"),
            Self::Verify(err) => write!(f, "password verification failed: {err}"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hash(err) | Self::MalformedHash(err) | Self::Verify(err) => Some(err),
        }
    }
}

/// Hashes a plaintext password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(CredentialError::Hash)
}

/// True for a complete Argon2 PHC string: known variant and a hash part.
pub fn is_password_hash(value: &str) -> bool {
    match PasswordHash::new(value) {
        Ok(parsed) => {
            parsed.hash.is_some() && ARGON2_ALGORITHMS.contains(&parsed.algorithm.as_str())
        }
        Err(_) => false,
    }
}

/// `Ok(false)` on mismatch; errors only when the check itself cannot run.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored_hash).map_err(CredentialError::MalformedHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(CredentialError::Verify(err)),
    }
}
