//! Database schema migrations for SQLite.
//!
//! Versioned, forward-only. Each migration transforms the schema from
//! version N to N+1 and is recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, vaultify_core::now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated metadata schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: users, credentials, tokens.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,          -- Argon2id PHC string
            public_key_pem TEXT NOT NULL,
            private_key_encrypted TEXT NOT NULL,  -- base64 IV || ct || tag
            kdf_salt TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE credentials (
            record_id INTEGER PRIMARY KEY AUTOINCREMENT,
            credential_uuid TEXT NOT NULL UNIQUE, -- names the ciphertext artifact
            owner_id INTEGER NOT NULL,
            filename TEXT NOT NULL,
            plaintext_hash TEXT NOT NULL,
            ciphertext_hash TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            wrapped_key TEXT NOT NULL,
            iv TEXT NOT NULL
        );

        CREATE TABLE tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value TEXT NOT NULL UNIQUE,
            credential_id INTEGER NOT NULL,
            issuer_user_id INTEGER NOT NULL,
            expiry INTEGER NOT NULL,              -- Unix ms
            revoked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_credentials_owner ON credentials(owner_id);
        CREATE INDEX idx_tokens_issuer ON tokens(issuer_user_id);
        CREATE INDEX idx_tokens_expiry ON tokens(expiry) WHERE revoked = 0;
        "#,
    )?;

    Ok(())
}
