//! Golden vectors for the hashed and signed wire formats.
//!
//! Any implementation talking to the same ledger must reproduce these
//! byte for byte.

/// Token value used by every vector.
pub const TOKEN: &str = "0123456789abcdef0123456789abcdef";

/// `sha256(TOKEN)`.
pub const TOKEN_HASH: &str = "3eb1bd439947eb762998e566ccc2e099c791118b2f40579cc4f7da2b5061b7f9";

pub const CREDENTIAL_ID: i64 = 42;
pub const CREDENTIAL_UUID: &str = "6f1c2a9e-8d4b-4c1e-9a57-0b3d2e7f1a10";
pub const ISSUER_ID: i64 = 1;
pub const EXPIRY: i64 = 1_700_000_000_000;
pub const PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----\nMFww\n-----END PUBLIC KEY-----\n";

/// `sha256(TOKEN_HASH + ":" + CREDENTIAL_ID)`.
pub const ANCHOR_DATA_HASH: &str =
    "698cd6a4b21b75cf0bec3e5f18fde55c58aa2ab61147183bb20396a1dc82b9dd";

/// `sha256(TOKEN_HASH|CREDENTIAL_ID|PUBLIC_KEY_PEM|EXPIRY)`.
pub const PAYLOAD_HASH: &str = "31fef48199c80f5ab4c59dd75d4c242903eb32f1488b2d2fd183b2c1e13939f6";

/// Canonical signed payload for an unanchored certificate.
pub const CANONICAL_UNANCHORED: &str = concat!(
    r#"{"issuerUserId":1,"credentialId":42,"#,
    r#""tokenHash":"3eb1bd439947eb762998e566ccc2e099c791118b2f40579cc4f7da2b5061b7f9","#,
    r#""expiry":1700000000000,"ledgerBlockHash":""}"#
);

/// `sha256("REVOKE:" + TOKEN_HASH)`.
pub const REVOKE_DATA_HASH: &str =
    "e316774477b50b0c6078663ce549df9e14b6146f9098873a0ebd2ab255173494";

/// Plaintext whose hash feeds [`ADD_CREDENTIAL_DATA_HASH`].
pub const PLAINTEXT: &str = "hunter2";
pub const PLAINTEXT_HASH: &str = "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";

/// `sha256(CREDENTIAL_UUID + ":" + PLAINTEXT_HASH)`.
pub const ADD_CREDENTIAL_DATA_HASH: &str =
    "9c9f6670fef3e6ca34d6b8826907cb72beac7f513f20e930d8c810e89ada69d8";

/// `sha256("DELETE:" + CREDENTIAL_UUID)`.
pub const DELETE_CREDENTIAL_DATA_HASH: &str =
    "e1d4bda700cc09a2e547036d1470f5a7916fa9b7ceb781a48241cefadbc05f82";

/// `sha256("LOGIN:alice:" + EXPIRY)`.
pub const LOGIN_DATA_HASH: &str = "83da81bd40035bf30aada382f64b495c7f628af98a43976b2b607bc800f64cc0";

/// Hash of a block `0|0|GENESIS|<64 zeros>|<64 zeros>`.
pub const GENESIS_AT_ZERO_HASH: &str =
    "99b82ef902396a3dcb7496ace820903c9f741bf0cdcbc19555e3f88b4277a21a";

#[cfg(test)]
mod tests {
    use super::*;
    use vaultify_core::hash;
    use vaultify_core::SignedPayload;
    use vaultify_ledger::compute_block_hash;

    #[test]
    fn test_token_and_anchor_hashes() {
        assert_eq!(hash::token_hash(TOKEN), TOKEN_HASH);
        assert_eq!(hash::anchor_data_hash(TOKEN_HASH, CREDENTIAL_ID), ANCHOR_DATA_HASH);
        assert_eq!(
            hash::payload_hash(TOKEN_HASH, CREDENTIAL_ID, PUBLIC_KEY_PEM, EXPIRY),
            PAYLOAD_HASH
        );
    }

    #[test]
    fn test_canonical_payload() {
        let payload = SignedPayload {
            issuer_user_id: ISSUER_ID,
            credential_id: CREDENTIAL_ID,
            token_hash: TOKEN_HASH.into(),
            expiry: EXPIRY,
            ledger_block_hash: String::new(),
        };
        assert_eq!(payload.canonical_json(), CANONICAL_UNANCHORED);
    }

    #[test]
    fn test_ledger_data_hashes() {
        assert_eq!(hash::revoke_data_hash(TOKEN_HASH), REVOKE_DATA_HASH);
        assert_eq!(hash::sha256_hex(PLAINTEXT), PLAINTEXT_HASH);
        assert_eq!(
            hash::add_credential_data_hash(CREDENTIAL_UUID, PLAINTEXT_HASH),
            ADD_CREDENTIAL_DATA_HASH
        );
        assert_eq!(
            hash::delete_credential_data_hash(CREDENTIAL_UUID),
            DELETE_CREDENTIAL_DATA_HASH
        );
        assert_eq!(hash::login_data_hash("alice", EXPIRY), LOGIN_DATA_HASH);
    }

    #[test]
    fn test_block_hash() {
        let zeros = "0".repeat(64);
        assert_eq!(
            compute_block_hash(0, 0, "GENESIS", &zeros, &zeros),
            GENESIS_AT_ZERO_HASH
        );
    }
}
