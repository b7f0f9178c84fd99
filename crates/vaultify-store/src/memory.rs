//! In-memory implementations of the storage traits.
//!
//! Same semantics as SQLite, no persistence. [`Tables`] also backs the
//! JSON file store, which snapshots it to disk after every mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use vaultify_core::{Credential, RecordId, Token, User, UserId};

use crate::error::{Result, StoreError};
use crate::traits::{BlobStore, MetadataStore};

/// The three metadata collections, keyed by id.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub users: BTreeMap<UserId, User>,
    pub credentials: BTreeMap<RecordId, Credential>,
    pub tokens: BTreeMap<i64, Token>,
    pub last_ids: LastIds,
}

/// Highest id ever handed out per collection.
///
/// Deleted ids are never reused, matching SQLite `AUTOINCREMENT`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LastIds {
    pub users: i64,
    pub credentials: i64,
    pub tokens: i64,
}

// Next id for a BTreeMap keyed by positive integers.
fn next_id<V>(last: i64, map: &BTreeMap<i64, V>) -> i64 {
    map.keys().next_back().map_or(last, |&top| top.max(last)) + 1
}

impl Tables {
    pub fn insert_user(&mut self, user: &User) -> Result<UserId> {
        if self.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {}", user.username)));
        }
        let id = if user.id == 0 {
            next_id(self.last_ids.users, &self.users)
        } else {
            user.id
        };
        if self.users.contains_key(&id) {
            return Err(StoreError::Conflict(format!("user id {id}")));
        }
        self.users.insert(id, User { id, ..user.clone() });
        self.last_ids.users = self.last_ids.users.max(id);
        Ok(id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        self.users.values().find(|u| u.username == username).cloned()
    }

    pub fn insert_credential(&mut self, credential: &Credential) -> Result<RecordId> {
        if self.credentials.values().any(|c| c.id == credential.id) {
            return Err(StoreError::Conflict(format!("credential {}", credential.id)));
        }
        let record_id = if credential.record_id == 0 {
            next_id(self.last_ids.credentials, &self.credentials)
        } else {
            credential.record_id
        };
        if self.credentials.contains_key(&record_id) {
            return Err(StoreError::Conflict(format!("credential record {record_id}")));
        }
        self.credentials.insert(
            record_id,
            Credential {
                record_id,
                ..credential.clone()
            },
        );
        self.last_ids.credentials = self.last_ids.credentials.max(record_id);
        Ok(record_id)
    }

    pub fn credential_by_uuid(&self, id: &str) -> Option<Credential> {
        self.credentials.values().find(|c| c.id == id).cloned()
    }

    pub fn credentials_of(&self, owner: UserId) -> Vec<Credential> {
        self.credentials
            .values()
            .filter(|c| c.owner_id == owner)
            .cloned()
            .collect()
    }

    pub fn insert_token(&mut self, token: &Token) -> Result<i64> {
        if self.tokens.values().any(|t| t.value == token.value) {
            // Never echo the token value into an error.
            return Err(StoreError::Conflict("duplicate token value".into()));
        }
        let id = if token.id == 0 {
            next_id(self.last_ids.tokens, &self.tokens)
        } else {
            token.id
        };
        if self.tokens.contains_key(&id) {
            return Err(StoreError::Conflict(format!("token id {id}")));
        }
        self.tokens.insert(id, Token { id, ..token.clone() });
        self.last_ids.tokens = self.last_ids.tokens.max(id);
        Ok(id)
    }

    pub fn token_by_value(&self, value: &str) -> Option<Token> {
        self.tokens.values().find(|t| t.value == value).cloned()
    }

    pub fn tokens_of(&self, issuer: UserId) -> Vec<Token> {
        self.tokens
            .values()
            .filter(|t| t.issuer_user_id == issuer)
            .cloned()
            .collect()
    }

    pub fn revoke_token(&mut self, value: &str) -> bool {
        match self.tokens.values_mut().find(|t| t.value == value) {
            Some(t) => {
                t.revoked = true;
                true
            }
            None => false,
        }
    }

    pub fn delete_expired_tokens(&mut self, now: i64) -> u64 {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.revoked || !t.is_expired(now));
        (before - self.tokens.len()) as u64
    }
}

/// In-memory metadata store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<UserId> {
        self.write()?.insert_user(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.read()?.user_by_username(username))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.read()?.users.len() as u64)
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<RecordId> {
        self.write()?.insert_credential(credential)
    }

    async fn get_credential(&self, record_id: RecordId) -> Result<Option<Credential>> {
        Ok(self.read()?.credentials.get(&record_id).cloned())
    }

    async fn get_credential_by_uuid(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self.read()?.credential_by_uuid(id))
    }

    async fn list_credentials(&self, owner: UserId) -> Result<Vec<Credential>> {
        Ok(self.read()?.credentials_of(owner))
    }

    async fn list_all_credentials(&self) -> Result<Vec<Credential>> {
        Ok(self.read()?.credentials.values().cloned().collect())
    }

    async fn delete_credential(&self, record_id: RecordId) -> Result<bool> {
        Ok(self.write()?.credentials.remove(&record_id).is_some())
    }

    async fn insert_token(&self, token: &Token) -> Result<i64> {
        self.write()?.insert_token(token)
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        Ok(self.read()?.token_by_value(value))
    }

    async fn list_tokens(&self, issuer: UserId) -> Result<Vec<Token>> {
        Ok(self.read()?.tokens_of(issuer))
    }

    async fn revoke_token(&self, value: &str) -> Result<bool> {
        Ok(self.write()?.revoke_token(value))
    }

    async fn delete_expired_tokens(&self, now: i64) -> Result<u64> {
        Ok(self.write()?.delete_expired_tokens(now))
    }

    async fn count_tokens(&self) -> Result<u64> {
        Ok(self.read()?.tokens.len() as u64)
    }
}

/// In-memory artifact store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite stored bytes in place, bypassing the normal write path.
    ///
    /// Lets tests simulate on-disk corruption.
    pub fn tamper(&self, id: &str, f: impl FnOnce(&mut Vec<u8>)) -> Result<bool> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get_mut(id).map(f).is_some())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        blobs.insert(id.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let blobs = self.blobs.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<_> = blobs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_credential, sample_token, sample_user};

    #[tokio::test]
    async fn test_user_ids_and_uniqueness() {
        let store = MemoryStore::new();

        let a = store.insert_user(&sample_user("alice")).await.unwrap();
        let b = store.insert_user(&sample_user("bob")).await.unwrap();
        assert_eq!((a, b), (1, 2));

        let dup = store.insert_user(&sample_user("alice")).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        let alice = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(store.count_users().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_explicit_ids_are_kept() {
        let store = MemoryStore::new();
        let mut cred = sample_credential(1);
        cred.record_id = 17;
        assert_eq!(store.insert_credential(&cred).await.unwrap(), 17);
        assert_eq!(store.insert_credential(&sample_credential(1)).await.unwrap(), 18);
    }

    #[tokio::test]
    async fn test_deleted_ids_are_not_reused() {
        let store = MemoryStore::new();
        store.insert_credential(&sample_credential(1)).await.unwrap();
        let b = store.insert_credential(&sample_credential(1)).await.unwrap();
        assert!(store.delete_credential(b).await.unwrap());

        let c = store.insert_credential(&sample_credential(1)).await.unwrap();
        assert_eq!((b, c), (2, 3));

        // Swept tokens free their ids the same way.
        store.insert_token(&sample_token(1, 100, false)).await.unwrap();
        assert_eq!(store.delete_expired_tokens(500).await.unwrap(), 1);
        assert_eq!(store.insert_token(&sample_token(1, 10_000, false)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_credential_lookup_and_delete() {
        let store = MemoryStore::new();
        let cred = sample_credential(1);
        let id = store.insert_credential(&cred).await.unwrap();

        let by_uuid = store.get_credential_by_uuid(&cred.id).await.unwrap().unwrap();
        assert_eq!(by_uuid.record_id, id);
        assert_eq!(store.list_credentials(1).await.unwrap().len(), 1);
        assert!(store.list_credentials(2).await.unwrap().is_empty());

        assert!(store.delete_credential(id).await.unwrap());
        assert!(!store.delete_credential(id).await.unwrap());
        assert!(store.get_credential(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_revoke_and_sweep() {
        let store = MemoryStore::new();
        store.insert_token(&sample_token(1, 100, false)).await.unwrap();
        store.insert_token(&sample_token(1, 100, false)).await.unwrap();
        store.insert_token(&sample_token(1, 10_000, false)).await.unwrap();

        let expired = store.list_tokens(1).await.unwrap()[0].clone();
        assert!(store.revoke_token(&expired.value).await.unwrap());
        assert!(!store.revoke_token("ffffffffffffffffffffffffffffffff").await.unwrap());

        // One expired+revoked (kept), one expired (removed), one live (kept).
        assert_eq!(store.delete_expired_tokens(500).await.unwrap(), 1);
        assert_eq!(store.count_tokens().await.unwrap(), 2);
        assert!(store.get_token(&expired.value).await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_sweep_boundary_is_inclusive() {
        let store = MemoryStore::new();
        store.insert_token(&sample_token(1, 100, false)).await.unwrap();
        assert_eq!(store.delete_expired_tokens(99).await.unwrap(), 0);
        assert_eq!(store.delete_expired_tokens(100).await.unwrap(), 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_sweep_keeps_revoked_and_live(
            tokens in proptest::collection::vec((0i64..1_000, proptest::bool::ANY), 0..40),
            now in 0i64..1_000,
        ) {
            let mut tables = Tables::default();
            for (expiry, revoked) in &tokens {
                tables.insert_token(&sample_token(1, *expiry, *revoked)).unwrap();
            }
            let removed = tables.delete_expired_tokens(now);

            let expected = tokens.iter().filter(|(e, r)| !*r && *e <= now).count() as u64;
            proptest::prop_assert_eq!(removed, expected);
            for t in tables.tokens.values() {
                proptest::prop_assert!(t.revoked || t.expiry > now);
            }
        }
    }

    #[tokio::test]
    async fn test_blob_store_idempotent_delete() {
        let blobs = MemoryBlobStore::new();
        blobs.put("a", b"bytes").await.unwrap();
        assert_eq!(blobs.get("a").await.unwrap().unwrap(), b"bytes");
        assert!(blobs.delete("a").await.unwrap());
        assert!(!blobs.delete("a").await.unwrap());
        assert!(blobs.get("a").await.unwrap().is_none());
    }
}
