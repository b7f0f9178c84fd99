//! The ledger anchor contract.

use async_trait::async_trait;
use vaultify_core::{Certificate, LedgerBlock, UserId};

use crate::messages::{BlockEntry, CertificateRecord};

/// Client side of the external hash-chained ledger.
///
/// Every method is resilient to the service being down: reads return
/// `None`, empty or `false`; writes log and report failure through their
/// return value. Nothing here returns an error or panics because the
/// network failed, so callers never need to guard a ledger call.
///
/// Implementations must be thread-safe (Send + Sync) and must not hold a
/// lock across a network call.
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Blocks
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a block. `None` when the ledger did not accept it.
    async fn append_block(&self, entry: &BlockEntry) -> Option<LedgerBlock>;

    /// Every block in chain order. Empty when unavailable.
    async fn get_all_blocks(&self) -> Vec<LedgerBlock>;

    /// A block by its hash. `None` when absent or unavailable.
    async fn get_block_by_hash(&self, hash: &str) -> Option<LedgerBlock>;

    /// Whether the service reports its chain as intact.
    async fn verify_chain_integrity(&self) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Certificates
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a certificate. Best-effort: returns whether it was accepted.
    async fn store_certificate(&self, certificate: &Certificate) -> bool;

    /// The registered certificate for a token hash.
    async fn get_certificate(&self, token_hash: &str) -> Option<CertificateRecord>;

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a token hash to the revocation list.
    async fn revoke_token(&self, token_hash: &str) -> bool;

    /// Whether a token hash is on the revocation list.
    async fn is_token_revoked(&self, token_hash: &str) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Public keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Publish a user's public key.
    async fn register_public_key(&self, user_id: UserId, public_key_pem: &str) -> bool;

    /// A user's published public key.
    async fn get_public_key(&self, user_id: UserId) -> Option<String>;

    // ─────────────────────────────────────────────────────────────────────────
    // Health
    // ─────────────────────────────────────────────────────────────────────────

    /// Short-timeout health probe.
    async fn is_available(&self) -> bool;
}
