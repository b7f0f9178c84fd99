//! # Vaultify Store
//!
//! Persistence for the vault: credential metadata, users and share tokens
//! behind [`MetadataStore`], ciphertext artifacts behind [`BlobStore`].
//!
//! ## Key Types
//!
//! - [`MetadataStore`] - Async trait for users, credentials and tokens
//! - [`BlobStore`] - Async trait for ciphertext artifacts keyed by UUID
//! - [`SqliteStore`] - SQLite-based primary store
//! - [`FileStore`] - JSON-file backup store
//! - [`DualStore`] - Primary + backup failover composite
//! - [`MemoryStore`] / [`MemoryBlobStore`] - In-memory stores for tests
//! - [`FsBlobStore`] - One `<uuid>.bin` file per artifact
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultify_store::{DualStore, FileStore, MetadataStore, SqliteStore, StorageMode};
//!
//! async fn example() {
//!     let primary = SqliteStore::open("vault_data/vault.db").unwrap();
//!     let backup = FileStore::open("vault_data/backup").unwrap();
//!     let store = DualStore::new(primary, backup, StorageMode::Dual);
//!
//!     let users = store.count_users().await.unwrap();
//!     println!("{users} registered users");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Store-assigned ids**: id `0` on insert means "assign the next one"
//! - **Failover**: in dual mode a backend outage degrades to the other side
//!   with a logged warning; conflicts are never retried
//! - **Tokens outlive revocation**: the expiry sweep never removes revoked tokens

pub mod blob;
pub mod dual;
pub mod error;
pub mod file;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod testing;

pub use blob::FsBlobStore;
pub use dual::{DualStore, StorageMode};
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::{MemoryBlobStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{BlobStore, MetadataStore};
