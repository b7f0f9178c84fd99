//! Input validation performed before any lookup or cryptography.

use rand::RngCore;

use crate::error::ValidationError;

/// Length of a share token's external representation.
pub const TOKEN_LEN: usize = 32;

/// Generate a share token: 128 random bits as 32 lowercase hex characters.
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_LEN / 2];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// True when `s` is exactly 32 lowercase hex characters.
pub fn is_token_format(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Reject anything that is not a well-formed token.
pub fn validate_token_format(s: &str) -> Result<(), ValidationError> {
    if is_token_format(s) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTokenFormat)
    }
}

/// Credential ids name artifact files, so they must be canonical UUIDs.
pub fn validate_credential_uuid(s: &str) -> Result<(), ValidationError> {
    match uuid::Uuid::try_parse(s) {
        Ok(id) if id.hyphenated().to_string() == s => Ok(()),
        _ => Err(ValidationError::InvalidCredentialId(s.to_owned())),
    }
}

/// Reject empty (or whitespace-only) required fields.
pub fn require_non_empty(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(())
    }
}

/// Token lifetimes are whole, positive hours.
pub fn validate_ttl_hours(ttl_hours: i64) -> Result<(), ValidationError> {
    if ttl_hours > 0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidTtl(ttl_hours))
    }
}
