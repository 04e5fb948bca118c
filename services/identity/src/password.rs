//! Password hashing with Argon2id

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::SaltString,
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    Params(String),
    #[error("Failed to hash password: {0}")]
    Hash(String),
}

/// One-way password hasher.
///
/// Every call to [`PasswordHasher::hash`] draws a fresh salt. Verification
/// parses the PHC string, so hashes produced with other parameters keep
/// verifying after a parameter change.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist, so an unknown email
    // costs the same as a wrong password.
    dummy_hash: String,
}

impl PasswordHasher {
    /// Hasher with the Argon2id defaults
    pub fn new() -> Result<Self, PasswordError> {
        Self::with_argon2(Argon2::default())
    }

    /// Hasher with explicit cost parameters
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Self::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn with_argon2(argon2: Argon2<'static>) -> Result<Self, PasswordError> {
        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("dummy-password-for-timing")?;
        Ok(hasher)
    }

    /// Hash a plaintext password with a random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Check a candidate against a stored hash. A malformed stored hash never
    /// verifies.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored_hash) {
            Ok(parsed_hash) => parsed_hash,
            Err(e) => {
                error!("Failed to parse stored password hash: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spend one verification's worth of work without a stored hash
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).expect("valid test params")
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("Secret123!").unwrap();

        assert_ne!(hash, "Secret123!");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("Secret123!", &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash("Secret123!").unwrap();
        let second = hasher.hash("Secret123!").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!hasher().verify("Secret123!", "not-a-phc-string"));
    }

    #[test]
    fn test_default_hash_verifies_with_cheap_hasher() {
        let strong = PasswordHasher::new().unwrap();
        let hash = strong.hash("Secret123!").unwrap();
        assert!(hasher().verify("Secret123!", &hash));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        assert!(matches!(
            PasswordHasher::with_params(1, 1, 1),
            Err(PasswordError::Params(_))
        ));
    }
}
