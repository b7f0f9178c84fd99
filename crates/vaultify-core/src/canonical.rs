//! Canonical signed payload.
//!
//! A certificate signature covers exactly this byte sequence:
//!
//! ```text
//! {"issuerUserId":<int>,"credentialId":<int>,"tokenHash":"<hex>","expiry":<int>,"ledgerBlockHash":"<hex-or-empty>"}
//! ```
//!
//! Field order, the absence of whitespace and the integer rendering are all
//! part of the wire contract. Verification rebuilds this string from the
//! certificate fields and never trusts a serialized copy.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey};

/// The fields a certificate signature binds, in signing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub issuer_user_id: i64,
    pub credential_id: i64,
    pub token_hash: String,
    pub expiry: i64,
    pub ledger_block_hash: String,
}

impl SignedPayload {
    /// Render the canonical JSON string.
    pub fn canonical_json(&self) -> String {
        format!(
            "{{\"issuerUserId\":{},\"credentialId\":{},\"tokenHash\":{},\"expiry\":{},\"ledgerBlockHash\":{}}}",
            self.issuer_user_id,
            self.credential_id,
            json_string(&self.token_hash),
            self.expiry,
            json_string(&self.ledger_block_hash),
        )
    }

    /// The canonical bytes (UTF-8 of [`Self::canonical_json`]).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_json().into_bytes()
    }

    /// Sign the canonical bytes.
    pub fn sign(&self, key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        key.sign(&self.canonical_bytes())
    }

    /// Verify a signature over the canonical bytes.
    pub fn verify(&self, key: &PublicKey, signature: &[u8]) -> Result<(), CryptoError> {
        key.verify(&self.canonical_bytes(), signature)
    }
}

// Hex strings never need escaping; anything else is escaped the JSON way so
// the rendering stays unambiguous.
fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}
