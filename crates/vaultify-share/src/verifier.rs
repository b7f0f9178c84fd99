//! Certificate verification.
//!
//! Four layers, run in order. The first failing layer decides the result
//! and later layers are not run.
//!
//! | Layer | Checks |
//! |---|---|
//! | 1. Local integrity | payload hash, RSA signature over the canonical payload |
//! | 2. Token binding | `sha256(token) == tokenHash` |
//! | 3. Online anchoring | ledger registration, revocation list, anchored block |
//! | 4. Expiry | `now < expiryEpochMs` |
//!
//! Layer 3 is skipped with a warning when the ledger is unreachable, so an
//! offline verifier still checks everything it can.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use vaultify_core::hash::token_hash;
use vaultify_core::{Certificate, PublicKey};
use vaultify_ledger::LedgerAnchor;

use crate::codec;
use crate::error::Result;

pub const MSG_TAMPERED: &str = "PayloadHash mismatch - certificate tampered";
pub const MSG_BAD_SIGNATURE: &str = "RSA signature verification FAILED";
pub const MSG_WRONG_TOKEN: &str = "Token mismatch - wrong token for this certificate";
pub const MSG_LEDGER_OFFLINE: &str = "Ledger server unavailable - skipping online checks";
pub const MSG_NOT_REGISTERED: &str = "Certificate not registered on ledger server";
pub const MSG_SIGNATURE_MISMATCH: &str = "Certificate signature mismatch with server";
pub const MSG_REVOKED: &str = "TOKEN REVOKED";
pub const MSG_BLOCK_MISSING: &str = "Ledger block not found - certificate not anchored";
pub const MSG_DATA_HASH_MISMATCH: &str = "dataHash mismatch - tampering detected";
pub const MSG_EXPIRED: &str = "Certificate EXPIRED";
pub const MSG_PASSED: &str = "All verification layers passed";

/// A verification layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Integrity = 1,
    TokenBinding = 2,
    Anchoring = 3,
    Expiry = 4,
}

impl Layer {
    pub const fn name(&self) -> &'static str {
        match self {
            Layer::Integrity => "local integrity",
            Layer::TokenBinding => "token binding",
            Layer::Anchoring => "online anchoring",
            Layer::Expiry => "expiry",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer {} ({})", *self as u8, self.name())
    }
}

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The layer that rejected the certificate, if any.
    pub failed_layer: Option<Layer>,
    pub message: String,
    /// Checks skipped along the way (ledger offline).
    pub warnings: Vec<String>,
}

impl Verification {
    fn fail(layer: Layer, message: &str, warnings: Vec<String>) -> Self {
        Self {
            valid: false,
            failed_layer: Some(layer),
            message: message.to_owned(),
            warnings,
        }
    }

    fn pass(warnings: Vec<String>) -> Self {
        Self {
            valid: true,
            failed_layer: None,
            message: MSG_PASSED.to_owned(),
            warnings,
        }
    }

    /// Whether online checks were skipped.
    pub fn is_offline(&self) -> bool {
        self.warnings.iter().any(|w| w == MSG_LEDGER_OFFLINE)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failed_layer {
            Some(layer) => write!(f, "INVALID - {layer}: {}", self.message),
            None => write!(f, "VALID - {}", self.message),
        }
    }
}

/// Runs the layered verification protocol.
#[derive(Clone)]
pub struct CertificateVerifier {
    ledger: Arc<dyn LedgerAnchor>,
}

impl CertificateVerifier {
    pub fn new(ledger: Arc<dyn LedgerAnchor>) -> Self {
        Self { ledger }
    }

    /// Load a certificate file and verify it against `token` at `now`.
    ///
    /// Errors only for a missing or unparseable file or an unparseable key.
    pub async fn verify_file(&self, path: &Path, token: &str, now: i64) -> Result<Verification> {
        let certificate = codec::load(path).await?;
        self.verify(&certificate, token, now).await
    }

    /// Verify a certificate against the token presented with it.
    pub async fn verify(&self, cert: &Certificate, token: &str, now: i64) -> Result<Verification> {
        // Parse up front: a certificate whose key cannot be read is malformed
        // input rather than an invalid certificate.
        let public_key = PublicKey::from_pem(&cert.issuer_public_key_pem)?;
        let mut warnings = Vec::new();

        // Layer 1: local integrity.
        if cert.compute_payload_hash() != cert.payload_hash {
            return Ok(reject(Layer::Integrity, MSG_TAMPERED, warnings));
        }
        let signature_ok = BASE64
            .decode(cert.signature_base64.as_bytes())
            .map(|sig| cert.signed_payload().verify(&public_key, &sig).is_ok())
            .unwrap_or(false);
        if !signature_ok {
            return Ok(reject(Layer::Integrity, MSG_BAD_SIGNATURE, warnings));
        }

        // Layer 2: token binding.
        if token_hash(token) != cert.token_hash {
            return Ok(reject(Layer::TokenBinding, MSG_WRONG_TOKEN, warnings));
        }

        // Layer 3: online anchoring.
        if self.ledger.is_available().await {
            if let Some(message) = self.check_anchoring(cert).await {
                return Ok(reject(Layer::Anchoring, message, warnings));
            }
        } else {
            warn!(credential_id = cert.credential_id, "{}", MSG_LEDGER_OFFLINE);
            warnings.push(MSG_LEDGER_OFFLINE.to_owned());
        }

        // Layer 4: expiry.
        if now >= cert.expiry_epoch_ms {
            return Ok(reject(Layer::Expiry, MSG_EXPIRED, warnings));
        }

        debug!(credential_id = cert.credential_id, "certificate verified");
        Ok(Verification::pass(warnings))
    }

    async fn check_anchoring(&self, cert: &Certificate) -> Option<&'static str> {
        match self.ledger.get_certificate(&cert.token_hash).await {
            None => return Some(MSG_NOT_REGISTERED),
            Some(record) if record.signature != cert.signature_base64 => {
                return Some(MSG_SIGNATURE_MISMATCH)
            }
            Some(_) => {}
        }

        if self.ledger.is_token_revoked(&cert.token_hash).await {
            return Some(MSG_REVOKED);
        }

        match self.ledger.get_block_by_hash(&cert.ledger_block_hash).await {
            None => Some(MSG_BLOCK_MISSING),
            Some(block) if block.data_hash != cert.anchor_data_hash() => {
                Some(MSG_DATA_HASH_MISMATCH)
            }
            Some(_) => None,
        }
    }
}

fn reject(layer: Layer, message: &str, warnings: Vec<String>) -> Verification {
    debug!(%layer, message, "certificate rejected");
    Verification::fail(layer, message, warnings)
}
