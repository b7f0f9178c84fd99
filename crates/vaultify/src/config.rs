//! Vault configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;
use vaultify_core::{KdfParams, DEFAULT_RSA_BITS};
use vaultify_ledger::LedgerConfig;
use vaultify_store::StorageMode;

/// Environment variable names read by [`VaultConfig::from_env`].
pub mod env {
    pub const DATA_DIR: &str = "VAULT_DATA_DIR";
    pub const STORAGE_MODE: &str = "VAULT_STORAGE_MODE";
    pub const LEDGER_API_URL: &str = "LEDGER_API_URL";
    pub const WORKER_THREADS: &str = "VAULT_WORKER_THREADS";
}

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root of everything the vault writes (default: `vault_data`).
    pub data_dir: PathBuf,
    /// Which metadata backends are used (default: dual).
    pub storage_mode: StorageMode,
    /// Ledger service client settings.
    pub ledger: LedgerConfig,
    /// Workers running background ledger appends (default: 4).
    pub worker_threads: usize,
    /// Period of the expired-token sweep (default: 1 hour).
    pub sweep_interval: Duration,
    /// Activity log entries buffered before new ones are dropped (default: 1024).
    pub activity_queue_capacity: usize,
    /// Upper bound on draining background work at shutdown (default: 5 seconds).
    pub shutdown_timeout: Duration,
    /// Share lifetime when the caller does not pick one (default: 48 hours).
    pub default_token_ttl_hours: i64,
    /// RSA modulus size for new accounts (default: 2048).
    pub rsa_bits: usize,
    /// Argon2id cost for password-derived keys.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("vault_data"),
            storage_mode: StorageMode::Dual,
            ledger: LedgerConfig::default(),
            worker_threads: 4,
            sweep_interval: Duration::from_secs(60 * 60),
            activity_queue_capacity: 1024,
            shutdown_timeout: Duration::from_secs(5),
            default_token_ttl_hours: 48,
            rsa_bits: DEFAULT_RSA_BITS,
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by any source of `KEY -> value` pairs.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(env::DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup(env::STORAGE_MODE) {
            config.storage_mode = mode.parse().unwrap_or_else(|_| {
                warn!(mode = %mode, "unknown storage mode, using sqlite");
                StorageMode::Primary
            });
        }
        if let Some(url) = lookup(env::LEDGER_API_URL).filter(|v| !v.trim().is_empty()) {
            config.ledger.base_url = url;
        }
        if let Some(threads) = lookup(env::WORKER_THREADS) {
            match threads.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.worker_threads = n,
                _ => warn!(value = %threads, "ignoring invalid worker thread count"),
            }
        }
        config
    }

    /// Directory of ciphertext artifacts.
    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }

    /// Directory of issued certificate files.
    pub fn certificates_dir(&self) -> PathBuf {
        self.data_dir.join("certificates")
    }

    /// SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("vault.db")
    }

    /// JSON backup store directory.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backup")
    }

    /// Activity log file.
    pub fn activity_log_path(&self) -> PathBuf {
        self.data_dir.join("activity.log")
    }

    /// Root directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
