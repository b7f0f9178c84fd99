//! JSON-file metadata store.
//!
//! A portable backup backend: the three collections live in memory and are
//! rewritten to `users.json`, `credentials.json` and `tokens.json` after
//! every mutation. Each document holds the records plus the highest id ever
//! assigned, so ids stay unique across deletes and restarts.
//!
//! Files are replaced atomically (write to a temporary sibling, then
//! rename) on the blocking pool. A mutation is applied to a copy of the
//! tables and only becomes visible once its document is on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vaultify_core::{Credential, RecordId, Token, User, UserId};

use crate::error::{Result, StoreError};
use crate::memory::{LastIds, Tables};
use crate::traits::MetadataStore;

const USERS_FILE: &str = "users.json";
const CREDENTIALS_FILE: &str = "credentials.json";
const TOKENS_FILE: &str = "tokens.json";

/// On-disk shape of one collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Document<T> {
    last_id: i64,
    records: Vec<T>,
}

impl<T> Default for Document<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            records: Vec::new(),
        }
    }
}

/// Which collection a mutation touches.
#[derive(Clone, Copy)]
enum Collection {
    Users,
    Credentials,
    Tokens,
}

impl Collection {
    fn file_name(self) -> &'static str {
        match self {
            Collection::Users => USERS_FILE,
            Collection::Credentials => CREDENTIALS_FILE,
            Collection::Tokens => TOKENS_FILE,
        }
    }

    fn save(self, dir: &Path, tables: &Tables) -> Result<()> {
        let path = dir.join(self.file_name());
        match self {
            Collection::Users => save(&path, tables.last_ids.users, tables.users.values()),
            Collection::Credentials => save(
                &path,
                tables.last_ids.credentials,
                tables.credentials.values(),
            ),
            Collection::Tokens => save(&path, tables.last_ids.tokens, tables.tokens.values()),
        }
    }
}

/// File-backed metadata store.
pub struct FileStore {
    dir: PathBuf,
    tables: Arc<Mutex<Tables>>,
    // Serializes mutations; never taken by readers.
    writer: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let users: Document<User> = load(&dir.join(USERS_FILE))?;
        let credentials: Document<Credential> = load(&dir.join(CREDENTIALS_FILE))?;
        let tokens: Document<Token> = load(&dir.join(TOKENS_FILE))?;

        let tables = Tables {
            last_ids: LastIds {
                users: users.last_id,
                credentials: credentials.last_id,
                tokens: tokens.last_id,
            },
            users: users.records.into_iter().map(|u| (u.id, u)).collect(),
            credentials: credentials
                .records
                .into_iter()
                .map(|c| (c.record_id, c))
                .collect(),
            tokens: tokens.records.into_iter().map(|t| (t.id, t)).collect(),
        };

        Ok(Self {
            dir,
            tables: Arc::new(Mutex::new(tables)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Directory holding the JSON documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        lock(&self.tables)
    }

    /// Apply a mutation on the blocking pool and persist the touched
    /// collection before publishing it.
    async fn mutate<F, T>(&self, collection: Collection, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let dir = self.dir.clone();
        let tables = Arc::clone(&self.tables);
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let _writer = writer.lock().map_err(|_| StoreError::Poisoned)?;
            let mut next = lock(&tables)?.clone();
            let out = f(&mut next)?;
            collection.save(&dir, &next)?;
            *lock(&tables)? = next;
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>> {
    tables.lock().map_err(|_| StoreError::Poisoned)
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<Document<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
        Err(e) => Err(e.into()),
    }
}

fn save<'a, T: Serialize + 'a>(
    path: &Path,
    last_id: i64,
    records: impl Iterator<Item = &'a T>,
) -> Result<()> {
    let document = Document {
        last_id,
        records: records.collect::<Vec<&T>>(),
    };
    let json = serde_json::to_vec_pretty(&document)?;

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl MetadataStore for FileStore {
    async fn insert_user(&self, user: &User) -> Result<UserId> {
        let user = user.clone();
        self.mutate(Collection::Users, move |t| t.insert_user(&user))
            .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.lock()?.user_by_username(username))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.lock()?.users.len() as u64)
    }

    async fn insert_credential(&self, credential: &Credential) -> Result<RecordId> {
        let credential = credential.clone();
        self.mutate(Collection::Credentials, move |t| {
            t.insert_credential(&credential)
        })
        .await
    }

    async fn get_credential(&self, record_id: RecordId) -> Result<Option<Credential>> {
        Ok(self.lock()?.credentials.get(&record_id).cloned())
    }

    async fn get_credential_by_uuid(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self.lock()?.credential_by_uuid(id))
    }

    async fn list_credentials(&self, owner: UserId) -> Result<Vec<Credential>> {
        Ok(self.lock()?.credentials_of(owner))
    }

    async fn list_all_credentials(&self) -> Result<Vec<Credential>> {
        Ok(self.lock()?.credentials.values().cloned().collect())
    }

    async fn delete_credential(&self, record_id: RecordId) -> Result<bool> {
        self.mutate(Collection::Credentials, move |t| {
            Ok(t.credentials.remove(&record_id).is_some())
        })
        .await
    }

    async fn insert_token(&self, token: &Token) -> Result<i64> {
        let token = token.clone();
        self.mutate(Collection::Tokens, move |t| t.insert_token(&token))
            .await
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        Ok(self.lock()?.token_by_value(value))
    }

    async fn list_tokens(&self, issuer: UserId) -> Result<Vec<Token>> {
        Ok(self.lock()?.tokens_of(issuer))
    }

    async fn revoke_token(&self, value: &str) -> Result<bool> {
        let value = value.to_owned();
        self.mutate(Collection::Tokens, move |t| Ok(t.revoke_token(&value)))
            .await
    }

    async fn delete_expired_tokens(&self, now: i64) -> Result<u64> {
        self.mutate(Collection::Tokens, move |t| Ok(t.delete_expired_tokens(now)))
            .await
    }

    async fn count_tokens(&self) -> Result<u64> {
        Ok(self.lock()?.tokens.len() as u64)
    }
}
