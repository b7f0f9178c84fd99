//! SHA-256 digests and the string formulas anchored on the ledger.
//!
//! Every digest that crosses a process boundary is rendered as lowercase hex.
//! The input formulas below are part of the wire contract with the ledger
//! service and with previously issued certificates; they must not change.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// `hex(sha256(data))`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    Sha256Hash::hash(data.as_ref()).to_hex()
}

/// Hash of a raw share token. The only form of a token that ever leaves
/// the token's own record.
pub fn token_hash(token: &str) -> String {
    sha256_hex(token)
}

/// `sha256(tokenHash + ":" + credentialId)`, the value a certificate
/// anchors on the ledger.
pub fn anchor_data_hash(token_hash: &str, credential_id: i64) -> String {
    sha256_hex(format!("{token_hash}:{credential_id}"))
}

/// `sha256(tokenHash|credentialId|issuerPublicKeyPem|expiry)`.
///
/// Local tamper check carried in the certificate next to the signature.
pub fn payload_hash(
    token_hash: &str,
    credential_id: i64,
    issuer_public_key_pem: &str,
    expiry: i64,
) -> String {
    sha256_hex(format!(
        "{token_hash}|{credential_id}|{issuer_public_key_pem}|{expiry}"
    ))
}

/// Data hash recorded with a `TOKEN_REVOKED` block.
pub fn revoke_data_hash(token_hash: &str) -> String {
    sha256_hex(format!("REVOKE:{token_hash}"))
}

/// Data hash recorded with an `ADD_CREDENTIAL` block.
pub fn add_credential_data_hash(credential_uuid: &str, plaintext_hash: &str) -> String {
    sha256_hex(format!("{credential_uuid}:{plaintext_hash}"))
}

/// Data hash recorded with a `DELETE_CREDENTIAL` block.
pub fn delete_credential_data_hash(credential_uuid: &str) -> String {
    sha256_hex(format!("DELETE:{credential_uuid}"))
}

/// Data hash recorded with a `USER_REGISTERED` block.
pub fn register_data_hash(username: &str, public_key_pem: &str) -> String {
    sha256_hex(format!("REGISTER:{username}:{public_key_pem}"))
}

/// Data hash recorded with a `USER_LOGIN` block.
pub fn login_data_hash(username: &str, now: i64) -> String {
    sha256_hex(format!("LOGIN:{username}:{now}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Sha256Hash::hash(b"vault");
        assert_eq!(Sha256Hash::from_hex(&h.to_hex()).unwrap(), h);
        assert!(Sha256Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_anchor_formula() {
        let th = token_hash("0123456789abcdef0123456789abcdef");
        assert_eq!(anchor_data_hash(&th, 7), sha256_hex(format!("{th}:7")));
        assert_ne!(anchor_data_hash(&th, 7), anchor_data_hash(&th, 8));
    }

    #[test]
    fn test_payload_hash_binds_every_field() {
        let base = payload_hash("aa", 1, "pem", 100);
        assert_ne!(base, payload_hash("ab", 1, "pem", 100));
        assert_ne!(base, payload_hash("aa", 2, "pem", 100));
        assert_ne!(base, payload_hash("aa", 1, "pem2", 100));
        assert_ne!(base, payload_hash("aa", 1, "pem", 101));
        assert_eq!(base, sha256_hex("aa|1|pem|100"));
    }

    #[test]
    fn test_action_hashes_are_distinct() {
        let th = "ff".repeat(32);
        assert_ne!(revoke_data_hash(&th), token_hash(&th));
        assert_eq!(delete_credential_data_hash("x"), sha256_hex("DELETE:x"));
    }
}
