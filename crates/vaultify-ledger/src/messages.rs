//! Ledger service wire types.
//!
//! Request and response bodies of the ledger HTTP contract. Every response
//! is parsed strictly into one of these structs; a body that does not match
//! is a decode error, never a best-effort guess.

use serde::{Deserialize, Serialize};

use vaultify_core::{Certificate, LedgerAction, LedgerBlock, SignedPayload, UserId};

/// Endpoint paths, relative to the configured base URL.
pub mod paths {
    pub const BLOCKS: &str = "/ledger/blocks";
    pub const VERIFY: &str = "/ledger/verify";
    pub const CERTIFICATES: &str = "/certificates";
    pub const REVOKED_TOKENS: &str = "/tokens/revoked";
    pub const USERS: &str = "/users";
    pub const HEALTH: &str = "/api/health";
}

/// Body of `POST /ledger/blocks`.
///
/// `token` carries a token *hash*; raw token values never leave the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub user_id: UserId,
    pub username: String,
    pub action: String,
    pub data_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl BlockEntry {
    /// An entry with no credential or token reference.
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        action: LedgerAction,
        data_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            action: action.as_str().to_owned(),
            data_hash: data_hash.into(),
            credential_id: None,
            token: None,
        }
    }

    /// Reference the credential this entry is about.
    pub fn with_credential(mut self, credential_id: impl ToString) -> Self {
        self.credential_id = Some(credential_id.to_string());
        self
    }

    /// Reference a token by its hash.
    pub fn with_token_hash(mut self, token_hash: impl Into<String>) -> Self {
        self.token = Some(token_hash.into());
        self
    }
}

/// Response of `POST /ledger/blocks` (201).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEnvelope {
    pub block: LedgerBlock,
}

/// Response of `GET /ledger/blocks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockList {
    pub blocks: Vec<LedgerBlock>,
}

/// Response of `GET /ledger/verify`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainStatus {
    pub valid: bool,
}

/// A certificate as the ledger service stores it.
///
/// Body of `POST /certificates` and response of `GET /certificates/{hash}`.
/// The token hash doubles as the certificate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub certificate_id: String,
    pub payload: SignedPayload,
    pub signature: String,
    pub issuer_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl From<&Certificate> for CertificateRecord {
    fn from(cert: &Certificate) -> Self {
        Self {
            certificate_id: cert.token_hash.clone(),
            payload: cert.signed_payload(),
            signature: cert.signature_base64.clone(),
            issuer_public_key: cert.issuer_public_key_pem.clone(),
            created_at: None,
        }
    }
}

/// Body of `POST /tokens/revoked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub token_hash: String,
}

/// Response of `GET /tokens/revoked/{hash}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatus {
    #[serde(default)]
    pub is_revoked: bool,
}

/// Body of `POST /users/{id}/public-key` and response of the matching GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyRecord {
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_entry_omits_absent_references() {
        let entry = BlockEntry::new(7, "alice", LedgerAction::UserLogin, "ab");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": 7,
                "username": "alice",
                "action": "USER_LOGIN",
                "dataHash": "ab",
            })
        );

        let entry = entry.with_credential(3).with_token_hash("cd");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["credentialId"], "3");
        assert_eq!(json["token"], "cd");
    }

    #[test]
    fn test_block_requires_every_field() {
        let partial = r#"{"block":{"index":1,"timestamp":2,"action":"X","dataHash":"d","hash":"h"}}"#;
        assert!(serde_json::from_str::<BlockEnvelope>(partial).is_err());
    }

    #[test]
    fn test_certificate_record_shape() {
        let json = r#"{
            "certificateId": "th",
            "payload": {"issuerUserId":1,"credentialId":2,"tokenHash":"th","expiry":3,"ledgerBlockHash":""},
            "signature": "c2ln",
            "issuerPublicKey": "pem",
            "createdAt": 99
        }"#;
        let record: CertificateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.payload.credential_id, 2);
        assert_eq!(record.created_at, Some(99));
    }
}
