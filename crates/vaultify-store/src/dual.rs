//! Primary + backup failover composite.
//!
//! [`DualStore`] implements [`MetadataStore`] by delegating to two inner
//! stores according to a [`StorageMode`]. In `Dual` mode:
//!
//! - Writes go to the primary first, then are mirrored to the backup with
//!   the ids the primary assigned. A failed mirror is logged; a failed
//!   primary write is logged and the backup takes the write alone.
//! - Reads go to the primary and fall back to the backup when the primary
//!   errors or has nothing.
//! - Logical errors (conflicts, invalid input) are returned as-is and never
//!   trigger a fallback.

use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::warn;
use vaultify_core::{Credential, RecordId, Token, User, UserId};

use crate::error::{Result, StoreError};
use crate::traits::MetadataStore;

/// Which inner store(s) a [`DualStore`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Primary only.
    Primary,
    /// Backup only.
    Backup,
    /// Primary with backup mirroring and read fallback.
    #[default]
    Dual,
}

impl FromStr for StorageMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "primary" => Ok(StorageMode::Primary),
            "file" | "backup" => Ok(StorageMode::Backup),
            "dual" => Ok(StorageMode::Dual),
            other => Err(StoreError::InvalidData(format!("unknown storage mode: {other}"))),
        }
    }
}

/// "Nothing found" for read fallback purposes.
trait Absent {
    fn is_absent(&self) -> bool;
}

impl<T> Absent for Option<T> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl<T> Absent for Vec<T> {
    fn is_absent(&self) -> bool {
        self.is_empty()
    }
}

impl Absent for u64 {
    fn is_absent(&self) -> bool {
        *self == 0
    }
}

/// Failover composite over a primary and a backup [`MetadataStore`].
pub struct DualStore<P, B> {
    primary: P,
    backup: B,
    mode: StorageMode,
}

impl<P: MetadataStore, B: MetadataStore> DualStore<P, B> {
    /// Compose two stores.
    pub fn new(primary: P, backup: B, mode: StorageMode) -> Self {
        Self {
            primary,
            backup,
            mode,
        }
    }

    /// Active mode.
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// The primary store.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The backup store.
    pub fn backup(&self) -> &B {
        &self.backup
    }

    async fn read<T: Absent>(
        &self,
        op: &'static str,
        primary: impl Future<Output = Result<T>>,
        backup: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.mode {
            StorageMode::Primary => primary.await,
            StorageMode::Backup => backup.await,
            StorageMode::Dual => match primary.await {
                Ok(v) if !v.is_absent() => Ok(v),
                Ok(_) => backup.await,
                Err(e) if e.is_logical() => Err(e),
                Err(e) => {
                    warn!(op, error = %e, "primary store read failed, using backup");
                    backup.await
                }
            },
        }
    }

    // Mutations whose result does not feed back into the mirror. In Dual
    // mode a record may live only in the backup (written during a primary
    // outage), so `merge` combines both outcomes.
    async fn write<T>(
        &self,
        op: &'static str,
        primary: impl Future<Output = Result<T>>,
        backup: impl Future<Output = Result<T>>,
        merge: fn(T, T) -> T,
    ) -> Result<T> {
        match self.mode {
            StorageMode::Primary => primary.await,
            StorageMode::Backup => backup.await,
            StorageMode::Dual => match primary.await {
                Ok(v) => match backup.await {
                    Ok(mirrored) => Ok(merge(v, mirrored)),
                    Err(e) => {
                        warn!(op, error = %e, "backup store mirror failed");
                        Ok(v)
                    }
                },
                Err(e) if e.is_logical() => Err(e),
                Err(e) => {
                    warn!(op, error = %e, "primary store write failed, using backup");
                    backup.await
                }
            },
        }
    }

    async fn mirror(&self, op: &'static str, result: impl Future<Output = Result<i64>>) {
        if let Err(e) = result.await {
            warn!(op, error = %e, "backup store mirror failed");
        }
    }
}

#[async_trait]
impl<P: MetadataStore, B: MetadataStore> MetadataStore for DualStore<P, B> {
    async fn insert_user(&self, user: &User) -> Result<UserId> {
        match self.mode {
            StorageMode::Primary => self.primary.insert_user(user).await,
            StorageMode::Backup => self.backup.insert_user(user).await,
            StorageMode::Dual => match self.primary.insert_user(user).await {
                Ok(id) => {
                    let mirrored = User { id, ..user.clone() };
                    self.mirror("insert_user", self.backup.insert_user(&mirrored)).await;
                    Ok(id)
                }
                Err(e) if e.is_logical() => Err(e),
                Err(e) => {
                    warn!(error = %e, "primary store write failed, using backup");
                    self.backup.insert_user(user).await
                }
            },
        }
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.read("get_user", self.primary.get_user(id), self.backup.get_user(id))
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.read(
            "get_user_by_username",
            self.primary.get_user_by_username(username),
            self.backup.get_user_by_username(username),
        )
        .await
    }

    async fn count_users(&self) -> Result<u64> {
        self.read("count_users", self.primary.count_users(), self.backup.count_users())
            .await
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<RecordId> {
        match self.mode {
            StorageMode::Primary => self.primary.insert_credential(credential).await,
            StorageMode::Backup => self.backup.insert_credential(credential).await,
            StorageMode::Dual => match self.primary.insert_credential(credential).await {
                Ok(record_id) => {
                    let mirrored = Credential {
                        record_id,
                        ..credential.clone()
                    };
                    self.mirror("insert_credential", self.backup.insert_credential(&mirrored))
                        .await;
                    Ok(record_id)
                }
                Err(e) if e.is_logical() => Err(e),
                Err(e) => {
                    warn!(error = %e, "primary store write failed, using backup");
                    self.backup.insert_credential(credential).await
                }
            },
        }
    }

    async fn get_credential(&self, record_id: RecordId) -> Result<Option<Credential>> {
        self.read(
            "get_credential",
            self.primary.get_credential(record_id),
            self.backup.get_credential(record_id),
        )
        .await
    }

    async fn get_credential_by_uuid(&self, id: &str) -> Result<Option<Credential>> {
        self.read(
            "get_credential_by_uuid",
            self.primary.get_credential_by_uuid(id),
            self.backup.get_credential_by_uuid(id),
        )
        .await
    }

    async fn list_credentials(&self, owner: UserId) -> Result<Vec<Credential>> {
        self.read(
            "list_credentials",
            self.primary.list_credentials(owner),
            self.backup.list_credentials(owner),
        )
        .await
    }

    async fn list_all_credentials(&self) -> Result<Vec<Credential>> {
        self.read(
            "list_all_credentials",
            self.primary.list_all_credentials(),
            self.backup.list_all_credentials(),
        )
        .await
    }

    async fn delete_credential(&self, record_id: RecordId) -> Result<bool> {
        self.write(
            "delete_credential",
            self.primary.delete_credential(record_id),
            self.backup.delete_credential(record_id),
            |a, b| a || b,
        )
        .await
    }

    async fn insert_token(&self, token: &Token) -> Result<i64> {
        match self.mode {
            StorageMode::Primary => self.primary.insert_token(token).await,
            StorageMode::Backup => self.backup.insert_token(token).await,
            StorageMode::Dual => match self.primary.insert_token(token).await {
                Ok(id) => {
                    let mirrored = Token { id, ..token.clone() };
                    self.mirror("insert_token", self.backup.insert_token(&mirrored)).await;
                    Ok(id)
                }
                Err(e) if e.is_logical() => Err(e),
                Err(e) => {
                    warn!(error = %e, "primary store write failed, using backup");
                    self.backup.insert_token(token).await
                }
            },
        }
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        self.read("get_token", self.primary.get_token(value), self.backup.get_token(value))
            .await
    }

    async fn list_tokens(&self, issuer: UserId) -> Result<Vec<Token>> {
        self.read(
            "list_tokens",
            self.primary.list_tokens(issuer),
            self.backup.list_tokens(issuer),
        )
        .await
    }

    async fn revoke_token(&self, value: &str) -> Result<bool> {
        self.write(
            "revoke_token",
            self.primary.revoke_token(value),
            self.backup.revoke_token(value),
            |a, b| a || b,
        )
        .await
    }

    async fn delete_expired_tokens(&self, now: i64) -> Result<u64> {
        self.write(
            "delete_expired_tokens",
            self.primary.delete_expired_tokens(now),
            self.backup.delete_expired_tokens(now),
            u64::max,
        )
        .await
    }

    async fn count_tokens(&self) -> Result<u64> {
        self.read("count_tokens", self.primary.count_tokens(), self.backup.count_tokens())
            .await
    }
}
