//! Fixtures shared by this crate's unit tests.

use std::sync::{Arc, OnceLock};

use vaultify_core::{KdfParams, KeyPair, DEFAULT_RSA_BITS};
use vaultify_ledger::MemoryLedger;
use vaultify_store::{MemoryBlobStore, MemoryStore};

use crate::config::VaultConfig;
use crate::vault::Vault;

pub fn keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).unwrap())
}

pub fn other_keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).unwrap())
}

/// A vault over in-memory components, with handles kept for inspection.
pub struct TestVault {
    pub vault: Vault,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub ledger: Arc<MemoryLedger>,
    _dir: tempfile::TempDir,
}

pub async fn test_vault() -> TestVault {
    let dir = tempfile::tempdir().unwrap();
    let config = VaultConfig {
        rsa_bits: 1024,
        kdf: KdfParams::insecure_fast(),
        ..VaultConfig::with_data_dir(dir.path())
    };
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    let vault = Vault::with_components(config, store.clone(), blobs.clone(), ledger.clone())
        .await
        .unwrap();
    TestVault {
        vault,
        store,
        blobs,
        ledger,
        _dir: dir,
    }
}
