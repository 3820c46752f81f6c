//! Password hashing boundary.
//!
//! The core never handles passwords itself. Login layers plug a
//! [`CredentialVerifier`] in; [`Argon2Verifier`] is the stock one.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::AuthResult;
use crate::error::AuthError;

/// Hashes and checks user passwords.
pub trait CredentialVerifier: Send + Sync {
    /// Hashes a password for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    fn hash(&self, password: &str) -> AuthResult<String>;

    /// Checks a password against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored hash is malformed. A wrong password is
    /// `Ok(false)`.
    fn verify(&self, password: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id with default parameters and a random salt per hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::internal(format!("malformed password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let verifier = Argon2Verifier;
        let hash = verifier.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify("correct horse", &hash).unwrap());
        assert!(!verifier.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_salted() {
        let verifier = Argon2Verifier;
        assert_ne!(verifier.hash("pw").unwrap(), verifier.hash("pw").unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        let err = Argon2Verifier.verify("pw", "not-a-hash").unwrap_err();
        assert!(err.is_server_error());
    }
}
