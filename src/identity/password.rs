//! Salted one-way password hashing (Argon2id, PHC string format).

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{RngCore, rngs::OsRng};

use super::error::StoreError;

const SALT_BYTES: usize = 16;

/// Hashes and verifies passwords with a fixed set of Argon2 parameters.
///
/// Verification reads the parameters embedded in the stored hash, so records
/// hashed with older parameters keep working after a cost change.
#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl CredentialHasher {
    #[must_use]
    pub const fn new(params: Params) -> Self {
        Self { params }
    }

    /// Cheap parameters for tests; never use these for real accounts.
    #[must_use]
    pub fn insecure_fast() -> Self {
        Self::new(Params::new(1024, 1, 1, None).unwrap_or_default())
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns `StoreError::Hash` if the OS RNG or Argon2 fails.
    pub fn hash(&self, password: &str) -> Result<String, StoreError> {
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|err| StoreError::Hash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt).map_err(|err| StoreError::Hash(err.to_string()))?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| StoreError::Hash(err.to_string()))
    }

    /// Check a password against a PHC hash. Unparseable hashes never match.
    #[must_use]
    pub fn verify(&self, password: &str, phc: &str) -> bool {
        PasswordHash::new(phc).is_ok_and(|parsed| {
            self.argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
