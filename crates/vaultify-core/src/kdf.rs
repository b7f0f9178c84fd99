//! Password handling with Argon2id.
//!
//! Two independent uses:
//! - [`hash_password`] / [`verify_password`] store and check a PHC string.
//! - [`derive_key`] turns a password plus a per-user salt into the 32-byte
//!   key that seals the user's private key at rest.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::aead::{ContentKey, KEY_LEN};
use crate::error::CryptoError;

/// Salt length for key derivation.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Cheap parameters for tests. Never use for real vaults.
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 8 * 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte key from a password and salt.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<ContentKey, CryptoError> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(password, salt, &mut out[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(ContentKey::from_bytes(*out))
}

/// Hash a password into a self-describing PHC string.
pub fn hash_password(password: &[u8], params: &KdfParams) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    params
        .argon2()?
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Check a password against a PHC string. Parameters come from the string.
pub fn verify_password(password: &[u8], phc: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| CryptoError::Encoding(format!("password hash: {e}")))?;
    Ok(Argon2::default().verify_password(password, &parsed).is_ok())
}
