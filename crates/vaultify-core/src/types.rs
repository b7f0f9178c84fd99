//! Domain records shared by every Vaultify crate.
//!
//! Field names serialize in camelCase; for [`Certificate`] and
//! [`LedgerBlock`] those names are the external wire format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::canonical::SignedPayload;
use crate::error::ValidationError;
use crate::hash;

/// Numeric user identifier assigned by the metadata store.
pub type UserId = i64;

/// Numeric credential record identifier assigned by the metadata store.
///
/// This is the `credentialId` carried by tokens and certificates. The
/// credential's UUID (`Credential::id`) names the ciphertext artifact.
pub type RecordId = i64;

/// Metadata for one encrypted credential.
///
/// The artifact stored under `id` hashes to `ciphertext_hash`, and
/// `wrapped_key` unwraps with the owner's private key to the AES key that
/// decrypts it. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Store-assigned record id; 0 until persisted.
    pub record_id: RecordId,
    /// Opaque UUID naming the ciphertext artifact.
    pub id: String,
    pub owner_id: UserId,
    pub filename: String,
    /// Hex SHA-256 of the plaintext.
    pub plaintext_hash: String,
    /// Hex SHA-256 of the stored artifact bytes.
    pub ciphertext_hash: String,
    pub file_size: u64,
    pub created_at: i64,
    /// Base64 RSA-OAEP wrapped content key.
    pub wrapped_key: String,
    /// Base64 IV (also the first 12 bytes of the artifact).
    pub iv: String,
}

/// Lifecycle state of a share token, derived at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Active,
    Expired,
    Revoked,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenStatus::Active => "ACTIVE",
            TokenStatus::Expired => "EXPIRED",
            TokenStatus::Revoked => "REVOKED",
        })
    }
}

/// A share token granting time-boxed proof of access to one credential.
///
/// `value` lives only in this record; certificates and the ledger carry
/// its SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Store-assigned id; 0 until persisted.
    pub id: i64,
    pub credential_id: RecordId,
    pub issuer_user_id: UserId,
    pub value: String,
    /// Unix ms after which the token is expired.
    pub expiry: i64,
    pub revoked: bool,
    pub created_at: i64,
}

impl Token {
    /// `!revoked && now < expiry`.
    pub fn is_valid(&self, now: i64) -> bool {
        !self.revoked && now < self.expiry
    }

    /// True once `now` reaches `expiry`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    /// Classify the token. Revocation is terminal and wins over expiry.
    pub fn status(&self, now: i64) -> TokenStatus {
        if self.revoked {
            TokenStatus::Revoked
        } else if self.is_expired(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }

    /// SHA-256 of the token value.
    pub fn hash(&self) -> String {
        hash::token_hash(&self.value)
    }
}

/// A signed, ledger-anchored statement binding a token hash to a credential.
///
/// Serialized field names are the certificate file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Certificate {
    pub token_hash: String,
    pub credential_id: RecordId,
    pub issuer_user_id: UserId,
    /// Copy of the credential's `ciphertext_hash`.
    pub credential_hash: String,
    pub issuer_public_key_pem: String,
    pub payload_hash: String,
    pub signature_base64: String,
    pub expiry_epoch_ms: i64,
    pub created_at_ms: i64,
    /// Empty when issuance could not reach the ledger.
    pub ledger_block_hash: String,
}

impl Certificate {
    /// The payload the signature covers, rebuilt from this certificate.
    pub fn signed_payload(&self) -> SignedPayload {
        SignedPayload {
            issuer_user_id: self.issuer_user_id,
            credential_id: self.credential_id,
            token_hash: self.token_hash.clone(),
            expiry: self.expiry_epoch_ms,
            ledger_block_hash: self.ledger_block_hash.clone(),
        }
    }

    /// Recompute the payload hash from the certificate fields.
    pub fn compute_payload_hash(&self) -> String {
        hash::payload_hash(
            &self.token_hash,
            self.credential_id,
            &self.issuer_public_key_pem,
            self.expiry_epoch_ms,
        )
    }

    /// The value this certificate expects to find in its ledger block.
    pub fn anchor_data_hash(&self) -> String {
        hash::anchor_data_hash(&self.token_hash, self.credential_id)
    }

    /// True when issuance produced a ledger block.
    pub fn is_anchored(&self) -> bool {
        !self.ledger_block_hash.is_empty()
    }

    /// Pretty JSON, as written to certificate files.
    pub fn to_json_pretty(&self) -> Result<String, ValidationError> {
        serde_json::to_string_pretty(self).map_err(|e| ValidationError::Malformed {
            what: "certificate",
            reason: e.to_string(),
        })
    }

    /// Strictly parse certificate JSON.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed {
            what: "certificate",
            reason: e.to_string(),
        })
    }
}

/// One block of the external hash-chained ledger.
///
/// All six fields are required; there is no fallback extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBlock {
    pub index: u64,
    pub timestamp: i64,
    pub action: String,
    pub data_hash: String,
    pub prev_hash: String,
    pub hash: String,
}

/// Actions this system records on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerAction {
    UserRegistered,
    UserLogin,
    AddCredential,
    DeleteCredential,
    GenerateToken,
    CertGenerated,
    TokenRevoked,
}

impl LedgerAction {
    /// All actions, in lifecycle order.
    pub const ALL: [LedgerAction; 7] = [
        LedgerAction::UserRegistered,
        LedgerAction::UserLogin,
        LedgerAction::AddCredential,
        LedgerAction::DeleteCredential,
        LedgerAction::GenerateToken,
        LedgerAction::CertGenerated,
        LedgerAction::TokenRevoked,
    ];

    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::UserRegistered => "USER_REGISTERED",
            LedgerAction::UserLogin => "USER_LOGIN",
            LedgerAction::AddCredential => "ADD_CREDENTIAL",
            LedgerAction::DeleteCredential => "DELETE_CREDENTIAL",
            LedgerAction::GenerateToken => "GENERATE_TOKEN",
            LedgerAction::CertGenerated => "CERT_GENERATED",
            LedgerAction::TokenRevoked => "TOKEN_REVOKED",
        }
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::Malformed {
                what: "ledger action",
                reason: s.to_owned(),
            })
    }
}

/// A registered vault user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-assigned id; 0 until persisted.
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub public_key_pem: String,
    /// Base64 of `IV ‖ AES-GCM(PKCS#8 DER private key) ‖ tag`.
    pub private_key_encrypted: String,
    /// Base64 salt for the key-encryption-key derivation.
    pub kdf_salt: String,
    pub created_at: i64,
}
