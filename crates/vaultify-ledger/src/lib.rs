//! # Vaultify Ledger
//!
//! Client side of the external ledger anchoring service: an append-only,
//! hash-chained log that timestamps certificate issuance and token
//! revocation so both become tamper-evident.
//!
//! ## Key Types
//!
//! - [`LedgerAnchor`] - The async contract every ledger backend implements
//! - [`HttpLedgerClient`] - reqwest client for the ledger HTTP/JSON API
//! - [`MemoryLedger`] - Local hash-chained ledger for tests and offline use
//! - [`BlockEntry`], [`CertificateRecord`] - Wire bodies
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultify_core::LedgerAction;
//! use vaultify_ledger::{BlockEntry, HttpLedgerClient, LedgerAnchor, LedgerConfig};
//!
//! async fn example() {
//!     let client = HttpLedgerClient::new(LedgerConfig::default()).unwrap();
//!     if client.is_available().await {
//!         let entry = BlockEntry::new(1, "alice", LedgerAction::UserLogin, "ab12");
//!         let block = client.append_block(&entry).await;
//!         println!("{block:?}");
//!     }
//! }
//! ```
//!
//! ## Failure Model
//!
//! The ledger is an optional dependency at runtime. [`LedgerAnchor`] calls
//! never fail: reads degrade to `None`, empty or `false`, writes report
//! `false`/`None` and log a warning. The `try_*` methods on
//! [`HttpLedgerClient`] expose the underlying [`LedgerError`].

pub mod error;
pub mod http;
pub mod memory;
pub mod messages;
pub mod traits;

pub use error::{LedgerError, Result};
pub use http::{HttpLedgerClient, LedgerConfig, DEFAULT_BASE_URL};
pub use memory::{compute_block_hash, verify_chain, MemoryLedger};
pub use messages::{BlockEntry, CertificateRecord};
pub use traits::LedgerAnchor;
