//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vaultify_core::{is_token_format, Certificate};

/// Credential contents, including empty.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A well-formed token value.
pub fn token_value() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}".prop_map(String::from)
}

/// Strings that are not well-formed token values.
pub fn malformed_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9a-f]{0,31}",
        "[0-9a-f]{33,48}",
        "[0-9a-f]{31}[A-F]",
        "[0-9a-f]{16}[g-z ]{16}",
    ]
    .prop_map(String::from)
    .prop_filter("must be malformed", |s| !is_token_format(s))
}

/// A share lifetime in hours.
pub fn ttl_hours() -> impl Strategy<Value = i64> {
    1i64..=24 * 30
}

/// A timestamp (Unix ms) between 2001 and 2096.
pub fn timestamp() -> impl Strategy<Value = i64> {
    1_000_000_000_000i64..=4_000_000_000_000
}

/// A signature-covered certificate field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedField {
    CredentialId,
    TokenHash,
    Expiry,
    LedgerBlockHash,
}

impl SignedField {
    pub const ALL: [SignedField; 4] = [
        SignedField::CredentialId,
        SignedField::TokenHash,
        SignedField::Expiry,
        SignedField::LedgerBlockHash,
    ];

    /// Change this field of `cert`. `salt` picks the change; the result
    /// always differs from the original.
    pub fn mutate(self, cert: &mut Certificate, salt: u8) {
        let delta = i64::from(salt.max(1));
        match self {
            SignedField::CredentialId => cert.credential_id = cert.credential_id.wrapping_add(delta),
            SignedField::Expiry => cert.expiry_epoch_ms = cert.expiry_epoch_ms.wrapping_add(delta),
            SignedField::TokenHash => flip_hex_char(&mut cert.token_hash, salt),
            SignedField::LedgerBlockHash if cert.ledger_block_hash.is_empty() => {
                cert.ledger_block_hash = format!("{salt:02x}").repeat(32)
            }
            SignedField::LedgerBlockHash => flip_hex_char(&mut cert.ledger_block_hash, salt),
        }
    }
}

impl Arbitrary for SignedField {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop::sample::select(SignedField::ALL.to_vec()).boxed()
    }
}

/// Replace one hex digit of `s` (position chosen by `salt`) with a different one.
pub fn flip_hex_char(s: &mut String, salt: u8) {
    if s.is_empty() {
        s.push('0');
        return;
    }
    let at = usize::from(salt) % s.len();
    let mut chars: Vec<char> = s.chars().collect();
    chars[at] = if chars[at] == '0' { '1' } else { '0' };
    *s = chars.into_iter().collect();
}

/// Flip one bit of `bytes`, addressed by an arbitrary index and bit.
pub fn flip_bit(bytes: &mut [u8], index: usize, bit: u8) {
    if bytes.is_empty() {
        return;
    }
    let at = index % bytes.len();
    bytes[at] ^= 1 << (bit % 8);
}
