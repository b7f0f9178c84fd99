//! # Vaultify
//!
//! A personal credential vault with revocable, ledger-anchored sharing.
//!
//! ## Overview
//!
//! - **Envelope encryption**: every credential gets its own AES-256-GCM key,
//!   wrapped under the owner's RSA public key
//! - **Accounts**: Argon2id password hashes; private keys sealed at rest with
//!   a password-derived key
//! - **Shares**: a random token plus a signed certificate, anchored on an
//!   external hash-chained ledger and revocable by the issuer
//! - **Verification**: anyone holding a certificate file and its token can
//!   run the 4-layer check
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultify::{Vault, VaultConfig};
//!
//! async fn example() {
//!     let vault = Vault::open(VaultConfig::from_env()).await.unwrap();
//!
//!     vault.register("alice", "correct horse").await.unwrap();
//!     let session = vault.login("alice", "correct horse").await.unwrap();
//!
//!     let cred = vault
//!         .add_credential(&session, "aws.txt", b"AKIA...")
//!         .await
//!         .unwrap();
//!
//!     // Hand grant.token.value and the certificate file to the recipient.
//!     let grant = vault.share(&session, cred.record_id, Some(24)).await.unwrap();
//!
//!     let report = vault
//!         .verify_certificate(&grant.certificate_path, &grant.token.value)
//!         .await
//!         .unwrap();
//!     println!("{report}");
//!
//!     vault.shutdown().await;
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Ledger off the critical path**: register, login, add and delete append
//!   their blocks from a background worker pool; a ledger outage never fails
//!   them
//! - **One context per vault**: the worker pool, token sweeper and activity
//!   log belong to the [`Vault`] and stop with [`Vault::shutdown`]
//! - **Opaque decryption failures**: a wrong key and a damaged artifact are
//!   the same error
//!
//! ## Re-exports
//!
//! - `vaultify::core` - Cipher, keys, hashes and domain records
//! - `vaultify::store` - Metadata and artifact stores
//! - `vaultify::ledger` - Ledger anchor client
//! - `vaultify::share` - Tokens, certificates and verification

pub mod accounts;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod reconcile;
pub mod vault;

#[cfg(test)]
mod testing;

// Re-export component crates
pub use vaultify_core as core;
pub use vaultify_ledger as ledger;
pub use vaultify_share as share;
pub use vaultify_store as store;

pub use accounts::{Accounts, Session};
pub use config::VaultConfig;
pub use context::{ActivityLog, ExecutionContext, Sweeper, WorkerPool};
pub use envelope::EnvelopeEngine;
pub use error::{Result, VaultError};
pub use reconcile::{DriftReport, LedgerStatus};
pub use vault::{ShareGrant, Vault, VaultStats};

pub use vaultify_core::{Certificate, Credential, LedgerBlock, Token, TokenStatus, User};
pub use vaultify_share::{Layer, TokenValidation, Verification};
