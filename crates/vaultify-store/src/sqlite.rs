//! SQLite implementation of the MetadataStore trait.
//!
//! This is the primary metadata backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use vaultify_core::{Credential, RecordId, Token, User, UserId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::MetadataStore;

const USER_COLUMNS: &str =
    "id, username, password_hash, public_key_pem, private_key_encrypted, kdf_salt, created_at";

const CREDENTIAL_COLUMNS: &str = "record_id, credential_uuid, owner_id, filename, plaintext_hash, \
     ciphertext_hash, file_size, created_at, wrapped_key, iv";

const TOKEN_COLUMNS: &str = "id, value, credential_id, issuer_user_id, expiry, revoked, created_at";

/// SQLite-based metadata store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// Map UNIQUE/PRIMARY KEY violations to Conflict, everything else to Database.
fn map_insert_err(what: &str) -> impl FnOnce(rusqlite::Error) -> StoreError + '_ {
    move |e| match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(what.to_owned())
        }
        other => StoreError::Database(other),
    }
}

// 0 means "let SQLite assign".
fn explicit_id(id: i64) -> Option<i64> {
    (id != 0).then_some(id)
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        public_key_pem: row.get("public_key_pem")?,
        private_key_encrypted: row.get("private_key_encrypted")?,
        kdf_salt: row.get("kdf_salt")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<Credential> {
    Ok(Credential {
        record_id: row.get("record_id")?,
        id: row.get("credential_uuid")?,
        owner_id: row.get("owner_id")?,
        filename: row.get("filename")?,
        plaintext_hash: row.get("plaintext_hash")?,
        ciphertext_hash: row.get("ciphertext_hash")?,
        file_size: row.get::<_, i64>("file_size")? as u64,
        created_at: row.get("created_at")?,
        wrapped_key: row.get("wrapped_key")?,
        iv: row.get("iv")?,
    })
}

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get("id")?,
        value: row.get("value")?,
        credential_id: row.get("credential_id")?,
        issuer_user_id: row.get("issuer_user_id")?,
        expiry: row.get("expiry")?,
        revoked: row.get("revoked")?,
        created_at: row.get("created_at")?,
    })
}

#[async_trait]
impl MetadataStore for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<UserId> {
        let user = user.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username, password_hash, public_key_pem,
                    private_key_encrypted, kdf_salt, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    explicit_id(user.id),
                    user.username,
                    user.password_hash,
                    user.public_key_pem,
                    user.private_key_encrypted,
                    user.kdf_salt,
                    user.created_at,
                ],
            )
            .map_err(map_insert_err(&format!("user {}", user.username)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    row_to_user,
                )
                .optional()?)
        })
        .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_owned();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                    params![username],
                    row_to_user,
                )
                .optional()?)
        })
        .await
    }

    async fn count_users(&self) -> Result<u64> {
        self.run(|conn| count(conn, "users")).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_credential(&self, credential: &Credential) -> Result<RecordId> {
        let c = credential.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO credentials (record_id, credential_uuid, owner_id, filename,
                    plaintext_hash, ciphertext_hash, file_size, created_at, wrapped_key, iv)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    explicit_id(c.record_id),
                    c.id,
                    c.owner_id,
                    c.filename,
                    c.plaintext_hash,
                    c.ciphertext_hash,
                    c.file_size as i64,
                    c.created_at,
                    c.wrapped_key,
                    c.iv,
                ],
            )
            .map_err(map_insert_err(&format!("credential {}", c.id)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_credential(&self, record_id: RecordId) -> Result<Option<Credential>> {
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE record_id = ?1"),
                    params![record_id],
                    row_to_credential,
                )
                .optional()?)
        })
        .await
    }

    async fn get_credential_by_uuid(&self, id: &str) -> Result<Option<Credential>> {
        let id = id.to_owned();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE credential_uuid = ?1"
                    ),
                    params![id],
                    row_to_credential,
                )
                .optional()?)
        })
        .await
    }

    async fn list_credentials(&self, owner: UserId) -> Result<Vec<Credential>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE owner_id = ?1
                 ORDER BY record_id"
            ))?;
            let rows = stmt.query_map(params![owner], row_to_credential)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn list_all_credentials(&self) -> Result<Vec<Credential>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY record_id"
            ))?;
            let rows = stmt.query_map([], row_to_credential)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn delete_credential(&self, record_id: RecordId) -> Result<bool> {
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM credentials WHERE record_id = ?1",
                params![record_id],
            )?;
            Ok(n > 0)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_token(&self, token: &Token) -> Result<i64> {
        let t = token.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO tokens (id, value, credential_id, issuer_user_id, expiry,
                    revoked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    explicit_id(t.id),
                    t.value,
                    t.credential_id,
                    t.issuer_user_id,
                    t.expiry,
                    t.revoked,
                    t.created_at,
                ],
            )
            .map_err(map_insert_err("token"))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        let value = value.to_owned();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE value = ?1"),
                    params![value],
                    row_to_token,
                )
                .optional()?)
        })
        .await
    }

    async fn list_tokens(&self, issuer: UserId) -> Result<Vec<Token>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TOKEN_COLUMNS} FROM tokens WHERE issuer_user_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![issuer], row_to_token)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn revoke_token(&self, value: &str) -> Result<bool> {
        let value = value.to_owned();
        self.run(move |conn| {
            let n = conn.execute("UPDATE tokens SET revoked = 1 WHERE value = ?1", params![value])?;
            Ok(n > 0)
        })
        .await
    }

    async fn delete_expired_tokens(&self, now: i64) -> Result<u64> {
        self.run(move |conn| {
            let n = conn.execute(
                "DELETE FROM tokens WHERE revoked = 0 AND expiry <= ?1",
                params![now],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn count_tokens(&self) -> Result<u64> {
        self.run(|conn| count(conn, "tokens")).await
    }
}

fn count(conn: &Connection, table: &str) -> Result<u64> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(n as u64)
}
