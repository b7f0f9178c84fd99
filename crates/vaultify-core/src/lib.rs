//! # Vaultify Core
//!
//! Pure primitives for the Vaultify credential vault: content encryption,
//! key wrapping, signatures, canonical payloads and the domain records that
//! flow between the other crates.
//!
//! This crate contains no I/O, no storage, no networking. Time is always
//! passed in as Unix milliseconds so every rule here is deterministic.
//!
//! ## Key Types
//!
//! - [`ContentKey`] - AES-256-GCM key producing self-describing `IV‖ct‖tag` blobs
//! - [`KeyPair`], [`PublicKey`], [`PrivateKey`] - RSA-2048 keys for wrapping and signing
//! - [`Sha256Hash`] - Hex-rendered SHA-256 digests used across the wire contract
//! - [`SignedPayload`] - The byte-exact JSON a certificate signature covers
//! - [`Credential`], [`Token`], [`Certificate`], [`LedgerBlock`], [`User`] - Domain records
//!
//! ## Canonicalization
//!
//! Certificates are signed over a fixed-order JSON string. See [`canonical`].

pub mod aead;
pub mod canonical;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod types;
pub mod validation;

pub use aead::{ContentKey, Iv, IV_LEN, KEY_LEN, TAG_LEN};
pub use canonical::SignedPayload;
pub use error::{CoreError, CryptoError, Result, ValidationError};
pub use hash::Sha256Hash;
pub use kdf::KdfParams;
pub use keys::{KeyPair, PrivateKey, PublicKey, DEFAULT_RSA_BITS};
pub use types::{
    Certificate, Credential, LedgerAction, LedgerBlock, RecordId, Token, TokenStatus, User,
    UserId,
};
pub use validation::{generate_token_value, is_token_format, validate_token_format};

/// Current wall-clock time in Unix milliseconds.
///
/// Everything in this crate takes `now` as a parameter; callers at the edge
/// use this to supply it.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
