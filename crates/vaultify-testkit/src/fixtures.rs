//! Test fixtures and helpers.
//!
//! Common setup code for integration and property tests.

use std::path::Path;
use std::sync::{Arc, Once, OnceLock};

use tracing_subscriber::EnvFilter;
use vaultify::accounts::Session;
use vaultify::{EnvelopeEngine, Vault, VaultConfig};
use vaultify_core::{Credential, KdfParams, KeyPair, Token, UserId, DEFAULT_RSA_BITS};
use vaultify_ledger::MemoryLedger;
use vaultify_share::{
    CertificateIssuer, CertificateVerifier, IssuedCertificate, Signer, TokenManager, Verification,
};
use vaultify_store::{MemoryBlobStore, MemoryStore, MetadataStore};

/// RSA size for accounts created by [`TestVault`]. Shares and verification
/// behave the same at any size; only generation time differs.
pub const TEST_RSA_BITS: usize = 1024;

/// Install a `tracing` subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A full-size key pair, generated once per test binary.
pub fn keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).expect("rsa key generation"))
}

/// A second, unrelated key pair.
pub fn other_keypair() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(DEFAULT_RSA_BITS).expect("rsa key generation"))
}

/// Defaults rooted at `dir` with cheap key generation and KDF cost.
pub fn fast_config(dir: &Path) -> VaultConfig {
    VaultConfig {
        rsa_bits: TEST_RSA_BITS,
        kdf: KdfParams::insecure_fast(),
        ..VaultConfig::with_data_dir(dir)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Whole vault
// ─────────────────────────────────────────────────────────────────────────────

/// A [`Vault`] over in-memory components, keeping handles to each.
pub struct TestVault {
    pub vault: Vault,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub ledger: Arc<MemoryLedger>,
    pub dir: tempfile::TempDir,
}

impl TestVault {
    pub async fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let vault = Vault::with_components(
            fast_config(dir.path()),
            store.clone(),
            blobs.clone(),
            ledger.clone(),
        )
        .await
        .expect("vault");
        Self {
            vault,
            store,
            blobs,
            ledger,
            dir,
        }
    }

    /// Register `name` (password `<name>-password`) and log in.
    pub async fn user(&self, name: &str) -> Session {
        let password = format!("{name}-password");
        self.vault.register(name, &password).await.expect("register");
        self.vault.login(name, &password).await.expect("login")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Share components at explicit times
// ─────────────────────────────────────────────────────────────────────────────

/// Token manager, issuer and verifier wired to one in-memory ledger, with a
/// stored credential ready to share. Every call takes `now` explicitly.
pub struct ShareFixture {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub tokens: TokenManager,
    pub issuer: CertificateIssuer,
    pub verifier: CertificateVerifier,
    pub credential: Credential,
    pub owner: UserId,
    pub public_key_pem: String,
    pub dir: tempfile::TempDir,
}

impl ShareFixture {
    pub async fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let owner = 1;

        let envelope = EnvelopeEngine::new(Arc::new(MemoryBlobStore::new()));
        let mut credential = envelope
            .store(b"fixture secret", "fixture.txt", keypair().public_key(), owner, 0)
            .await
            .expect("envelope store");
        credential.record_id = store
            .insert_credential(&credential)
            .await
            .expect("insert credential");

        Self {
            tokens: TokenManager::new(store.clone(), ledger.clone()),
            issuer: CertificateIssuer::new(ledger.clone(), dir.path().join("certificates")),
            verifier: CertificateVerifier::new(ledger.clone()),
            public_key_pem: keypair().public_key().to_pem().expect("pem"),
            store,
            ledger,
            credential,
            owner,
            dir,
        }
    }

    pub fn signer(&self) -> Signer<'_> {
        Signer {
            user_id: self.owner,
            username: "owner",
            private_key: keypair().private_key(),
            public_key_pem: &self.public_key_pem,
        }
    }

    /// Issue a token and certificate at `now`.
    pub async fn share(&self, ttl_hours: i64, now: i64) -> (Token, IssuedCertificate) {
        let token = self
            .tokens
            .issue(self.owner, self.credential.record_id, ttl_hours, now)
            .await
            .expect("issue token");
        let issued = self
            .issuer
            .issue(&token, &self.credential, self.signer(), now)
            .await
            .expect("issue certificate");
        (token, issued)
    }

    /// Verify a certificate file against `token` at `now`.
    pub async fn verify(&self, issued: &IssuedCertificate, token: &str, now: i64) -> Verification {
        self.verifier
            .verify_file(&issued.path, token, now)
            .await
            .expect("verify")
    }
}
