//! Storage traits: the abstract interfaces for vault persistence.
//!
//! [`MetadataStore`] keeps users, credential metadata and share tokens.
//! [`BlobStore`] keeps the ciphertext artifacts themselves. The rest of the
//! system is written against these traits so that backends (SQLite, JSON
//! files, memory, or a failover composite) can be swapped freely.

use async_trait::async_trait;
use vaultify_core::{Credential, RecordId, Token, User, UserId};

use crate::error::Result;

/// Async interface for metadata persistence.
///
/// # Design Notes
///
/// - **Store-assigned ids**: inserting a record whose id is `0` assigns the
///   next id; a non-zero id is kept as given. The composite store relies on
///   this to mirror records with identical ids.
/// - **Uniqueness**: usernames, credential UUIDs, token values and explicit
///   ids are unique. Violations return `StoreError::Conflict`.
/// - **No partial updates**: credentials are immutable; the only token
///   mutation is the one-way `revoked` flag.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user, returning its id.
    async fn insert_user(&self, user: &User) -> Result<UserId>;

    /// Get a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Get a user by username.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Number of registered users.
    async fn count_users(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert credential metadata, returning its record id.
    async fn insert_credential(&self, credential: &Credential) -> Result<RecordId>;

    /// Get credential metadata by record id.
    async fn get_credential(&self, record_id: RecordId) -> Result<Option<Credential>>;

    /// Get credential metadata by artifact UUID.
    async fn get_credential_by_uuid(&self, id: &str) -> Result<Option<Credential>>;

    /// All credentials owned by a user, ordered by record id.
    async fn list_credentials(&self, owner: UserId) -> Result<Vec<Credential>>;

    /// Every credential in the store, ordered by record id.
    async fn list_all_credentials(&self) -> Result<Vec<Credential>>;

    /// Delete credential metadata. Returns whether a record was removed.
    async fn delete_credential(&self, record_id: RecordId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a share token, returning its id.
    async fn insert_token(&self, token: &Token) -> Result<i64>;

    /// Look up a token by its value.
    async fn get_token(&self, value: &str) -> Result<Option<Token>>;

    /// All tokens issued by a user, ordered by id.
    async fn list_tokens(&self, issuer: UserId) -> Result<Vec<Token>>;

    /// Mark a token revoked. Returns whether the token exists.
    ///
    /// Revocation is terminal; revoking twice is a no-op.
    async fn revoke_token(&self, value: &str) -> Result<bool>;

    /// Delete non-revoked tokens whose expiry is at or before `now`.
    ///
    /// Revoked tokens are kept as a permanent record. Returns the number
    /// of tokens removed.
    async fn delete_expired_tokens(&self, now: i64) -> Result<u64>;

    /// Number of stored tokens.
    async fn count_tokens(&self) -> Result<u64>;
}

/// Async interface for ciphertext artifact storage.
///
/// Artifacts are opaque byte strings keyed by credential UUID.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write (or replace) an artifact.
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()>;

    /// Read an artifact.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Remove an artifact. Removing a missing artifact is not an error;
    /// the return value says whether anything was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Ids of every stored artifact.
    async fn list(&self) -> Result<Vec<String>>;
}
