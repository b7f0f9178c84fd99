//! Error types for Vaultify Core.

use thiserror::Error;

/// Cryptographic failures.
///
/// `Decryption` is deliberately opaque: a wrong unwrapping key and a failed
/// GCM tag check produce the same value and the same message.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("decryption failed")]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Malformed input, rejected before any cryptography runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid token format: expected 32 lowercase hex characters")]
    InvalidTokenFormat,

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid credential id: {0}")]
    InvalidCredentialId(String),

    #[error("ttl must be positive, got {0} hours")]
    InvalidTtl(i64),

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Umbrella error for operations that can fail either way.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
