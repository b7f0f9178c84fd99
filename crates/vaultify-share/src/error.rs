//! Error types for the share module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while issuing or checking shares.
///
/// An ordinary invalid certificate is not an error; the verifier reports it
/// through its result. These are for broken input and failed backends.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Input rejected before any lookup or crypto.
    #[error("validation error: {0}")]
    Validation(#[from] vaultify_core::ValidationError),

    /// No token with this value exists.
    #[error("token not found")]
    TokenNotFound,

    /// No certificate file at this path.
    #[error("certificate not found: {}", .0.display())]
    CertificateNotFound(PathBuf),

    /// Signing failed, or a key could not be parsed.
    #[error("crypto error: {0}")]
    Crypto(#[from] vaultify_core::CryptoError),

    /// Metadata store failure.
    #[error("store error: {0}")]
    Store(#[from] vaultify_store::StoreError),

    /// Certificate file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for share operations.
pub type Result<T> = std::result::Result<T, ShareError>;
