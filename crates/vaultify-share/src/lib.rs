//! # Vaultify Share
//!
//! Time-boxed, revocable proof of access to one credential.
//!
//! A share is a random token handed to a recipient together with a signed
//! certificate. The certificate binds the token's hash to a credential and
//! an expiry, is anchored on the ledger, and can be checked by anyone
//! holding the token and the certificate file.
//!
//! ## Key Types
//!
//! - [`TokenManager`] - Issue, validate, revoke and sweep share tokens
//! - [`CertificateIssuer`] - Sign, anchor and persist certificates
//! - [`CertificateVerifier`] - The 4-layer verification protocol
//! - [`Verification`] - Structured verification outcome naming the failed [`Layer`]
//!
//! ## Flow
//!
//! ```text
//! owner ── issue token ──► sign + anchor certificate ──► token + cert file
//!                                                          │ (out of band)
//! recipient ◄──────────────────────────────────────────────┘
//!     └── verify(cert, token) ──► L1 integrity ─► L2 binding ─► L3 ledger ─► L4 expiry
//! ```
//!
//! A certificate proves authorized knowledge of a credential; it does not
//! carry key material and grants no decryption rights.

pub mod codec;
pub mod error;
pub mod issuer;
pub mod tokens;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use error::{Result, ShareError};
pub use issuer::{CertificateIssuer, IssuedCertificate, Signer};
pub use tokens::{InvalidToken, TokenManager, TokenValidation};
pub use verifier::{CertificateVerifier, Layer, Verification};
