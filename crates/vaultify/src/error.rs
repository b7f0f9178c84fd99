//! Error types for the vault.

use thiserror::Error;
use vaultify_core::{CryptoError, ValidationError};
use vaultify_ledger::LedgerError;
use vaultify_share::ShareError;
use vaultify_store::StoreError;

/// Errors surfaced by [`Vault`](crate::Vault) operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input, rejected before any crypto.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cipher or signature failure. Decryption failures are opaque.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Missing credential, token, certificate or block.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to touch this record.
    #[error("access denied: {0}")]
    Security(String),

    /// The ledger service could not be reached.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Metadata store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Unknown user or wrong password; the two are not distinguished.
    #[error("invalid username or password")]
    Authentication,

    /// Filesystem failure outside the stores.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background or blocking task died.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ShareError> for VaultError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::Validation(e) => VaultError::Validation(e),
            ShareError::TokenNotFound => VaultError::NotFound("token".into()),
            ShareError::CertificateNotFound(path) => {
                VaultError::NotFound(format!("certificate {}", path.display()))
            }
            ShareError::Crypto(e) => VaultError::Crypto(e),
            ShareError::Store(e) => VaultError::Storage(e),
            ShareError::Io(e) => VaultError::Io(e),
        }
    }
}

impl From<LedgerError> for VaultError {
    fn from(e: LedgerError) -> Self {
        VaultError::LedgerUnavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Internal(e.to_string())
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
