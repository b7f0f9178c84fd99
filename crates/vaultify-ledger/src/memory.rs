//! In-process hash-chained ledger.
//!
//! Implements the same contract as the HTTP client against local state:
//! a genesis block, SHA-256 chained blocks, a certificate registry, a
//! revocation list and published public keys. An availability switch
//! simulates outages so degraded paths can be exercised without a network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use vaultify_core::hash::sha256_hex;
use vaultify_core::{now_millis, Certificate, LedgerBlock, UserId};

use crate::messages::{BlockEntry, CertificateRecord};
use crate::traits::LedgerAnchor;

/// Action recorded on block 0.
pub const GENESIS_ACTION: &str = "GENESIS";

/// Hash of a block's contents: `sha256(index|timestamp|action|dataHash|prevHash)`.
pub fn compute_block_hash(
    index: u64,
    timestamp: i64,
    action: &str,
    data_hash: &str,
    prev_hash: &str,
) -> String {
    sha256_hex(format!("{index}|{timestamp}|{action}|{data_hash}|{prev_hash}"))
}

/// Check hashes and links of a chain, starting from its first block.
pub fn verify_chain(blocks: &[LedgerBlock]) -> bool {
    blocks.iter().enumerate().all(|(i, block)| {
        let recomputed = compute_block_hash(
            block.index,
            block.timestamp,
            &block.action,
            &block.data_hash,
            &block.prev_hash,
        );
        let linked = match i {
            0 => true,
            _ => block.prev_hash == blocks[i - 1].hash,
        };
        block.index == i as u64 && block.hash == recomputed && linked
    })
}

#[derive(Default)]
struct State {
    blocks: Vec<LedgerBlock>,
    certificates: HashMap<String, CertificateRecord>,
    revoked: HashSet<String>,
    public_keys: HashMap<UserId, String>,
}

/// Local ledger.
pub struct MemoryLedger {
    state: Mutex<State>,
    available: AtomicBool,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        let genesis = LedgerBlock {
            index: 0,
            timestamp: 0,
            action: GENESIS_ACTION.to_owned(),
            data_hash: "0".repeat(64),
            prev_hash: "0".repeat(64),
            hash: compute_block_hash(0, 0, GENESIS_ACTION, &"0".repeat(64), &"0".repeat(64)),
        };
        Self {
            state: Mutex::new(State {
                blocks: vec![genesis],
                ..State::default()
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the service going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.lock().blocks.len()
    }

    /// Whether only the genesis block exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Rewrite a stored block in place, bypassing the chain rules.
    ///
    /// Lets tests model a compromised ledger. Returns whether the block exists.
    pub fn tamper_block(&self, index: usize, f: impl FnOnce(&mut LedgerBlock)) -> bool {
        self.lock().blocks.get_mut(index).map(f).is_some()
    }

    fn up(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    // Every mutation is a single insert or push; a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerAnchor for MemoryLedger {
    async fn append_block(&self, entry: &BlockEntry) -> Option<LedgerBlock> {
        if !self.up() {
            return None;
        }
        let mut state = self.lock();
        let prev = state.blocks.last()?.clone();
        let index = prev.index + 1;
        let timestamp = now_millis().max(prev.timestamp);
        let block = LedgerBlock {
            index,
            timestamp,
            action: entry.action.clone(),
            data_hash: entry.data_hash.clone(),
            prev_hash: prev.hash.clone(),
            hash: compute_block_hash(index, timestamp, &entry.action, &entry.data_hash, &prev.hash),
        };
        state.blocks.push(block.clone());
        debug!(index, action = %block.action, "memory ledger block appended");
        Some(block)
    }

    async fn get_all_blocks(&self) -> Vec<LedgerBlock> {
        if !self.up() {
            return Vec::new();
        }
        self.lock().blocks.clone()
    }

    async fn get_block_by_hash(&self, hash: &str) -> Option<LedgerBlock> {
        if !self.up() {
            return None;
        }
        self.lock().blocks.iter().find(|b| b.hash == hash).cloned()
    }

    async fn verify_chain_integrity(&self) -> bool {
        self.up() && verify_chain(&self.lock().blocks)
    }

    async fn store_certificate(&self, certificate: &Certificate) -> bool {
        if !self.up() {
            return false;
        }
        let mut record = CertificateRecord::from(certificate);
        record.created_at = Some(now_millis());
        self.lock()
            .certificates
            .insert(record.certificate_id.clone(), record);
        true
    }

    async fn get_certificate(&self, token_hash: &str) -> Option<CertificateRecord> {
        if !self.up() {
            return None;
        }
        self.lock().certificates.get(token_hash).cloned()
    }

    async fn revoke_token(&self, token_hash: &str) -> bool {
        if !self.up() {
            return false;
        }
        self.lock().revoked.insert(token_hash.to_owned());
        true
    }

    async fn is_token_revoked(&self, token_hash: &str) -> bool {
        self.up() && self.lock().revoked.contains(token_hash)
    }

    async fn register_public_key(&self, user_id: UserId, public_key_pem: &str) -> bool {
        if !self.up() {
            return false;
        }
        self.lock()
            .public_keys
            .insert(user_id, public_key_pem.to_owned());
        true
    }

    async fn get_public_key(&self, user_id: UserId) -> Option<String> {
        if !self.up() {
            return None;
        }
        self.lock().public_keys.get(&user_id).cloned()
    }

    async fn is_available(&self) -> bool {
        self.up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultify_core::LedgerAction;

    fn entry(data_hash: &str) -> BlockEntry {
        BlockEntry::new(1, "alice", LedgerAction::AddCredential, data_hash)
    }

    #[tokio::test]
    async fn test_append_links_blocks() {
        let ledger = MemoryLedger::new();
        let a = ledger.append_block(&entry("aa")).await.unwrap();
        let b = ledger.append_block(&entry("bb")).await.unwrap();

        assert_eq!((a.index, b.index), (1, 2));
        assert_eq!(b.prev_hash, a.hash);
        assert_eq!(ledger.get_block_by_hash(&b.hash).await.unwrap(), b);
        assert!(ledger.verify_chain_integrity().await);
        assert_eq!(ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_tampering_breaks_chain() {
        let ledger = MemoryLedger::new();
        ledger.append_block(&entry("aa")).await.unwrap();
        ledger.append_block(&entry("bb")).await.unwrap();

        assert!(ledger.tamper_block(1, |b| b.data_hash = "ff".into()));
        assert!(!ledger.verify_chain_integrity().await);
    }

    #[tokio::test]
    async fn test_outage_degrades_every_call() {
        let ledger = MemoryLedger::new();
        let block = ledger.append_block(&entry("aa")).await.unwrap();
        ledger.revoke_token("th").await;

        ledger.set_available(false);
        assert!(!ledger.is_available().await);
        assert!(ledger.append_block(&entry("bb")).await.is_none());
        assert!(ledger.get_all_blocks().await.is_empty());
        assert!(ledger.get_block_by_hash(&block.hash).await.is_none());
        assert!(!ledger.verify_chain_integrity().await);
        assert!(!ledger.is_token_revoked("th").await);

        ledger.set_available(true);
        assert!(ledger.is_token_revoked("th").await);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_public_keys() {
        let ledger = MemoryLedger::new();
        assert!(ledger.register_public_key(4, "pem").await);
        assert_eq!(ledger.get_public_key(4).await.as_deref(), Some("pem"));
        assert!(ledger.get_public_key(5).await.is_none());
    }

    #[test]
    fn test_block_hash_format() {
        assert_eq!(
            compute_block_hash(1, 2, "A", "d", "p"),
            sha256_hex("1|2|A|d|p")
        );
    }
}
