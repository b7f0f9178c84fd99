//! Fixtures shared by this crate's unit tests.

use std::sync::OnceLock;

use vaultify_core::{Certificate, Credential, KeyPair, Token, DEFAULT_RSA_BITS};

/// One RSA key pair per test binary; generation is the slow part.
pub fn keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).unwrap())
}

/// A second, unrelated key pair.
pub fn other_keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).unwrap())
}

pub fn sample_credential() -> Credential {
    Credential {
        record_id: 42,
        id: "6f1c2a9e-8d4b-4c1e-9a57-0b3d2e7f1a10".into(),
        owner_id: 1,
        filename: "aws.txt".into(),
        plaintext_hash: "11".repeat(32),
        ciphertext_hash: "22".repeat(32),
        file_size: 64,
        created_at: 0,
        wrapped_key: "d3JhcA==".into(),
        iv: "aXZpdml2aXZpdml2".into(),
    }
}

pub fn sample_token(expiry: i64) -> Token {
    Token {
        id: 1,
        credential_id: 42,
        issuer_user_id: 1,
        value: "0123456789abcdef0123456789abcdef".into(),
        expiry,
        revoked: false,
        created_at: 0,
    }
}

/// A structurally valid certificate with a meaningless signature.
pub fn sample_certificate() -> Certificate {
    let mut cert = Certificate {
        token_hash: sample_token(0).hash(),
        credential_id: 42,
        issuer_user_id: 1,
        credential_hash: "22".repeat(32),
        issuer_public_key_pem: "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n".into(),
        payload_hash: String::new(),
        signature_base64: "c2lnbmF0dXJl".into(),
        expiry_epoch_ms: 1_000,
        created_at_ms: 0,
        ledger_block_hash: String::new(),
    };
    cert.payload_hash = cert.compute_payload_hash();
    cert
}
