//! Drift report across metadata, artifacts and the ledger.
//!
//! Read-only: nothing here repairs what it finds.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};
use vaultify_core::hash::{add_credential_data_hash, sha256_hex};
use vaultify_core::LedgerAction;
use vaultify_ledger::LedgerAnchor;
use vaultify_store::{BlobStore, MetadataStore};

use crate::error::Result;

/// What the ledger looked like during the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStatus {
    pub available: bool,
    pub chain_valid: bool,
    pub block_count: usize,
}

/// Differences found between the stores and the ledger.
///
/// Credential entries are UUIDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub credentials_checked: usize,
    /// Metadata whose artifact is gone.
    pub missing_artifacts: Vec<String>,
    /// Artifacts with no metadata.
    pub orphan_artifacts: Vec<String>,
    /// Artifacts whose hash no longer matches `ciphertextHash`.
    pub corrupted: Vec<String>,
    /// Credentials with no `ADD_CREDENTIAL` block. Empty when the ledger is down.
    pub unanchored: Vec<String>,
    pub ledger: LedgerStatus,
}

impl DriftReport {
    /// No drift, and a valid chain if the ledger could be checked.
    pub fn is_clean(&self) -> bool {
        self.missing_artifacts.is_empty()
            && self.orphan_artifacts.is_empty()
            && self.corrupted.is_empty()
            && self.unanchored.is_empty()
            && (!self.ledger.available || self.ledger.chain_valid)
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "credentials checked: {}", self.credentials_checked)?;
        writeln!(f, "missing artifacts:   {}", self.missing_artifacts.len())?;
        writeln!(f, "orphan artifacts:    {}", self.orphan_artifacts.len())?;
        writeln!(f, "corrupted artifacts: {}", self.corrupted.len())?;
        writeln!(f, "unanchored:          {}", self.unanchored.len())?;
        if self.ledger.available {
            write!(
                f,
                "ledger: {} blocks, chain {}",
                self.ledger.block_count,
                if self.ledger.chain_valid { "valid" } else { "BROKEN" }
            )
        } else {
            write!(f, "ledger: unavailable")
        }
    }
}

/// Cross-check every credential against its artifact and the ledger.
pub async fn reconcile(
    store: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    ledger: &dyn LedgerAnchor,
) -> Result<DriftReport> {
    let credentials = store.list_all_credentials().await?;
    let mut report = DriftReport {
        credentials_checked: credentials.len(),
        ..DriftReport::default()
    };

    for credential in &credentials {
        match blobs.get(&credential.id).await? {
            None => report.missing_artifacts.push(credential.id.clone()),
            Some(bytes) if sha256_hex(&bytes) != credential.ciphertext_hash => {
                report.corrupted.push(credential.id.clone())
            }
            Some(_) => {}
        }
    }

    let known: HashSet<&str> = credentials.iter().map(|c| c.id.as_str()).collect();
    report.orphan_artifacts = blobs
        .list()
        .await?
        .into_iter()
        .filter(|id| !known.contains(id.as_str()))
        .collect();

    if ledger.is_available().await {
        let blocks = ledger.get_all_blocks().await;
        let anchored: HashSet<&str> = blocks
            .iter()
            .filter(|b| b.action == LedgerAction::AddCredential.as_str())
            .map(|b| b.data_hash.as_str())
            .collect();
        report.unanchored = credentials
            .iter()
            .filter(|c| !anchored.contains(add_credential_data_hash(&c.id, &c.plaintext_hash).as_str()))
            .map(|c| c.id.clone())
            .collect();
        report.ledger = LedgerStatus {
            available: true,
            chain_valid: ledger.verify_chain_integrity().await,
            block_count: blocks.len(),
        };
    } else {
        warn!("ledger unavailable, reconciling local state only");
    }

    info!(
        credentials = report.credentials_checked,
        missing = report.missing_artifacts.len(),
        orphans = report.orphan_artifacts.len(),
        corrupted = report.corrupted.len(),
        unanchored = report.unanchored.len(),
        "reconciliation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultify_core::Credential;
    use vaultify_ledger::{BlockEntry, MemoryLedger};
    use vaultify_store::{MemoryBlobStore, MemoryStore};

    const A: &str = "0b6f7a52-3c1d-4e8a-9f20-5d4c3b2a1908";
    const B: &str = "9d2e4f61-7a8b-4c3d-8e1f-2a3b4c5d6e7f";
    const ORPHAN: &str = "1a2b3c4d-5e6f-4a1b-8c2d-3e4f5a6b7c8d";

    fn credential(id: &str, blob: &[u8]) -> Credential {
        Credential {
            record_id: 0,
            id: id.into(),
            owner_id: 1,
            filename: "f".into(),
            plaintext_hash: "ab".repeat(32),
            ciphertext_hash: sha256_hex(blob),
            file_size: 1,
            created_at: 0,
            wrapped_key: String::new(),
            iv: String::new(),
        }
    }

    async fn setup() -> (MemoryStore, MemoryBlobStore, MemoryLedger) {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let ledger = MemoryLedger::new();
        for id in [A, B] {
            let cred = credential(id, b"ciphertext");
            store.insert_credential(&cred).await.unwrap();
            blobs.put(id, b"ciphertext").await.unwrap();
            let entry = BlockEntry::new(
                1,
                "alice",
                LedgerAction::AddCredential,
                add_credential_data_hash(id, &cred.plaintext_hash),
            );
            ledger.append_block(&entry).await.unwrap();
        }
        (store, blobs, ledger)
    }

    #[tokio::test]
    async fn test_clean_vault() {
        let (store, blobs, ledger) = setup().await;
        let report = reconcile(&store, &blobs, &ledger).await.unwrap();
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.credentials_checked, 2);
        assert_eq!(report.ledger.block_count, 3);
        assert!(report.ledger.chain_valid);
    }

    #[tokio::test]
    async fn test_detects_each_kind_of_drift() {
        let (store, blobs, ledger) = setup().await;
        blobs.delete(A).await.unwrap();
        blobs.tamper(B, |b| b[0] ^= 1).unwrap();
        blobs.put(ORPHAN, b"stray").await.unwrap();
        store.insert_credential(&credential("5f6e7d8c-9b0a-4f1e-8d2c-3b4a5f6e7d8c", b"x")).await.unwrap();

        let report = reconcile(&store, &blobs, &ledger).await.unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.missing_artifacts.len(), 2);
        assert!(report.missing_artifacts.contains(&A.to_string()));
        assert_eq!(report.corrupted, vec![B.to_string()]);
        assert_eq!(report.orphan_artifacts, vec![ORPHAN.to_string()]);
        assert_eq!(report.unanchored, vec!["5f6e7d8c-9b0a-4f1e-8d2c-3b4a5f6e7d8c".to_string()]);
    }

    #[tokio::test]
    async fn test_broken_chain_and_offline_ledger() {
        let (store, blobs, ledger) = setup().await;
        ledger.tamper_block(1, |b| b.data_hash = "00".repeat(32));
        let report = reconcile(&store, &blobs, &ledger).await.unwrap();
        assert!(!report.ledger.chain_valid);
        assert!(!report.is_clean());

        ledger.set_available(false);
        let report = reconcile(&store, &blobs, &ledger).await.unwrap();
        assert_eq!(report.ledger, LedgerStatus::default());
        assert!(report.unanchored.is_empty());
        assert!(report.is_clean());
    }
}
