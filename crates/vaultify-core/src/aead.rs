//! AES-256-GCM content cipher.
//!
//! Produces self-describing artifacts: `IV (12) ‖ ciphertext ‖ tag (16)`.
//! There is no header or version byte; the algorithm is fixed.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM IV length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// A 96-bit GCM initialization vector.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_LEN]);

impl Iv {
    /// Generate a fresh random IV. Never reuse one under the same key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }

    /// Standard base64 rendering, as stored in credential metadata.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for Iv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iv({})", hex::encode(self.0))
    }
}

/// A 256-bit content encryption key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt under a fresh random IV, returning `IV ‖ ciphertext ‖ tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.encrypt_with_iv(plaintext, &Iv::generate())
    }

    /// Encrypt under a caller-chosen IV, returning `IV ‖ ciphertext ‖ tag`.
    pub fn encrypt_with_iv(&self, plaintext: &[u8], iv: &Iv) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));
        let sealed = cipher
            .encrypt(Nonce::from_slice(iv.as_bytes()), plaintext)
            .map_err(|_| CryptoError::Encryption("AES-GCM seal failed".into()))?;

        let mut blob = Vec::with_capacity(IV_LEN + sealed.len());
        blob.extend_from_slice(iv.as_bytes());
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    /// Decrypt an `IV ‖ ciphertext ‖ tag` blob.
    ///
    /// A blob of 12 bytes or fewer, and any tag mismatch, both fail with
    /// [`CryptoError::Decryption`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() <= IV_LEN {
            return Err(CryptoError::Decryption);
        }
        let (iv, sealed) = blob.split_at(IV_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));
        cipher
            .decrypt(Nonce::from_slice(iv), sealed)
            .map_err(|_| CryptoError::Decryption)
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// Split the IV off an artifact without decrypting it.
pub fn artifact_iv(blob: &[u8]) -> Option<Iv> {
    let bytes: [u8; IV_LEN] = blob.get(..IV_LEN)?.try_into().ok()?;
    Some(Iv(bytes))
}
