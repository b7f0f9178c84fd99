//! Record builders shared by the backend tests.

use vaultify_core::{generate_token_value, Credential, Token, User, UserId};

pub fn sample_user(username: &str) -> User {
    User {
        id: 0,
        username: username.into(),
        password_hash: "$argon2id$stub".into(),
        public_key_pem: "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n".into(),
        private_key_encrypted: "AAAA".into(),
        kdf_salt: "c2FsdA==".into(),
        created_at: 1_000,
    }
}

pub fn sample_credential(owner: UserId) -> Credential {
    Credential {
        record_id: 0,
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner,
        filename: "secret.txt".into(),
        plaintext_hash: "aa".repeat(32),
        ciphertext_hash: "bb".repeat(32),
        file_size: 12,
        created_at: 1_000,
        wrapped_key: "d3JhcHBlZA==".into(),
        iv: "aXZpdml2aXZpdml2".into(),
    }
}

pub fn sample_token(issuer: UserId, expiry: i64, revoked: bool) -> Token {
    Token {
        id: 0,
        credential_id: 1,
        issuer_user_id: issuer,
        value: generate_token_value(),
        expiry,
        revoked,
        created_at: 0,
    }
}
