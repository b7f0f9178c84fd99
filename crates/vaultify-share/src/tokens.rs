//! Share token lifecycle.
//!
//! ```text
//!  issue ──► ACTIVE ──(now >= expiry)──► EXPIRED ──(sweep)──► deleted
//!              │
//!              └──(revoke)──► REVOKED   (terminal, kept forever)
//! ```
//!
//! EXPIRED is derived from the clock, never stored. REVOKED is the only
//! stored transition and there is no way back from it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vaultify_core::validation::validate_ttl_hours;
use vaultify_core::{generate_token_value, is_token_format, validate_token_format, Token, UserId};
use vaultify_ledger::LedgerAnchor;
use vaultify_store::MetadataStore;

use crate::error::{Result, ShareError};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Why a presented token is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidToken {
    /// Not 32 lowercase hex characters. No lookup was made.
    BadFormat,
    NotFound,
    Expired,
    Revoked,
}

impl fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidToken::BadFormat => "invalid token format",
            InvalidToken::NotFound => "token not found",
            InvalidToken::Expired => "token expired",
            InvalidToken::Revoked => "token revoked",
        })
    }
}

/// Outcome of [`TokenManager::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(Token),
    Invalid(InvalidToken),
}

impl TokenValidation {
    /// True for [`TokenValidation::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenValidation::Valid(_))
    }
}

/// Issues, validates, revokes and sweeps share tokens.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn MetadataStore>,
    ledger: Arc<dyn LedgerAnchor>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn MetadataStore>, ledger: Arc<dyn LedgerAnchor>) -> Self {
        Self { store, ledger }
    }

    /// Issue a fresh token valid for `ttl_hours` from `now`.
    pub async fn issue(
        &self,
        issuer: UserId,
        credential_id: i64,
        ttl_hours: i64,
        now: i64,
    ) -> Result<Token> {
        validate_ttl_hours(ttl_hours)?;
        let mut token = Token {
            id: 0,
            credential_id,
            issuer_user_id: issuer,
            value: generate_token_value(),
            expiry: now.saturating_add(ttl_hours.saturating_mul(MILLIS_PER_HOUR)),
            revoked: false,
            created_at: now,
        };
        token.id = self.store.insert_token(&token).await?;
        debug!(
            token_id = token.id,
            credential_id,
            expiry = token.expiry,
            "share token issued"
        );
        Ok(token)
    }

    /// Revoke a token locally, then tell the ledger.
    ///
    /// Local revocation is authoritative: a failed remote call is logged and
    /// the revocation still stands. Returns the revoked token.
    pub async fn revoke(&self, value: &str) -> Result<Token> {
        validate_token_format(value)?;
        let mut token = self
            .store
            .get_token(value)
            .await?
            .ok_or(ShareError::TokenNotFound)?;

        if !self.store.revoke_token(value).await? {
            return Err(ShareError::TokenNotFound);
        }
        token.revoked = true;

        let token_hash = token.hash();
        if !self.ledger.revoke_token(&token_hash).await {
            warn!(token_id = token.id, "token revoked locally only; ledger did not record it");
        }
        info!(token_id = token.id, "share token revoked");
        Ok(token)
    }

    /// Classify a presented token value at `now`.
    ///
    /// Only a store failure is an error.
    pub async fn validate(&self, value: &str, now: i64) -> Result<TokenValidation> {
        if !is_token_format(value) {
            return Ok(TokenValidation::Invalid(InvalidToken::BadFormat));
        }
        let Some(token) = self.store.get_token(value).await? else {
            return Ok(TokenValidation::Invalid(InvalidToken::NotFound));
        };
        Ok(if token.revoked {
            TokenValidation::Invalid(InvalidToken::Revoked)
        } else if token.is_expired(now) {
            TokenValidation::Invalid(InvalidToken::Expired)
        } else {
            TokenValidation::Valid(token)
        })
    }

    /// Delete non-revoked tokens that expired at or before `now`.
    ///
    /// Tokens issued while a sweep runs are simply not seen by it.
    pub async fn sweep_expired(&self, now: i64) -> Result<u64> {
        let removed = self.store.delete_expired_tokens(now).await?;
        if removed > 0 {
            info!(removed, "expired share tokens swept");
        }
        Ok(removed)
    }

    /// Tokens issued by a user.
    pub async fn list_for(&self, issuer: UserId) -> Result<Vec<Token>> {
        Ok(self.store.list_tokens(issuer).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultify_ledger::MemoryLedger;
    use vaultify_store::MemoryStore;

    const HOUR: i64 = MILLIS_PER_HOUR;

    fn manager() -> (TokenManager, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let manager = TokenManager::new(Arc::new(MemoryStore::new()), ledger.clone());
        (manager, ledger)
    }

    #[tokio::test]
    async fn test_issue_sets_expiry_and_format() {
        let (tokens, _) = manager();
        let token = tokens.issue(1, 9, 2, 1_000).await.unwrap();
        assert!(is_token_format(&token.value));
        assert_eq!(token.expiry, 1_000 + 2 * HOUR);
        assert!(token.id > 0);
        assert!(tokens.validate(&token.value, 1_000).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_ttl() {
        let (tokens, _) = manager();
        assert!(matches!(
            tokens.issue(1, 9, 0, 0).await,
            Err(ShareError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_classifies() {
        let (tokens, _) = manager();
        let token = tokens.issue(1, 9, 1, 0).await.unwrap();

        let check = |v: &str, now| {
            let tokens = tokens.clone();
            let v = v.to_owned();
            async move { tokens.validate(&v, now).await.unwrap() }
        };

        assert_eq!(check("XYZ", 0).await, TokenValidation::Invalid(InvalidToken::BadFormat));
        assert_eq!(
            check(&"0".repeat(32), 0).await,
            TokenValidation::Invalid(InvalidToken::NotFound)
        );
        assert!(check(&token.value, HOUR - 1).await.is_valid());
        assert_eq!(
            check(&token.value, HOUR).await,
            TokenValidation::Invalid(InvalidToken::Expired)
        );
    }

    #[tokio::test]
    async fn test_revocation_is_terminal_and_reported() {
        let (tokens, ledger) = manager();
        let token = tokens.issue(1, 9, 1, 0).await.unwrap();

        let revoked = tokens.revoke(&token.value).await.unwrap();
        assert!(revoked.revoked);
        assert!(ledger.is_token_revoked(&token.hash()).await);

        for now in [0, HOUR / 2, HOUR * 2] {
            assert_eq!(
                tokens.validate(&token.value, now).await.unwrap(),
                TokenValidation::Invalid(InvalidToken::Revoked)
            );
        }
    }

    #[tokio::test]
    async fn test_revoke_survives_ledger_outage() {
        let (tokens, ledger) = manager();
        let token = tokens.issue(1, 9, 1, 0).await.unwrap();
        ledger.set_available(false);

        assert!(tokens.revoke(&token.value).await.is_ok());
        assert_eq!(
            tokens.validate(&token.value, 0).await.unwrap(),
            TokenValidation::Invalid(InvalidToken::Revoked)
        );
    }

    #[tokio::test]
    async fn test_revoke_token_held_only_by_backup_store() {
        use vaultify_store::{DualStore, StorageMode};

        let store = Arc::new(DualStore::new(
            MemoryStore::new(),
            MemoryStore::new(),
            StorageMode::Dual,
        ));
        let ledger = Arc::new(MemoryLedger::new());
        let tokens = TokenManager::new(store.clone(), ledger.clone());

        // Written while the primary was unreachable.
        let token = Token {
            id: 0,
            credential_id: 9,
            issuer_user_id: 1,
            value: generate_token_value(),
            expiry: HOUR,
            revoked: false,
            created_at: 0,
        };
        store.backup().insert_token(&token).await.unwrap();

        let revoked = tokens.revoke(&token.value).await.unwrap();
        assert!(revoked.revoked);
        assert!(ledger.is_token_revoked(&token.hash()).await);
        assert_eq!(
            tokens.validate(&token.value, 0).await.unwrap(),
            TokenValidation::Invalid(InvalidToken::Revoked)
        );
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let (tokens, _) = manager();
        assert!(matches!(
            tokens.revoke(&"a".repeat(32)).await,
            Err(ShareError::TokenNotFound)
        ));
        assert!(matches!(
            tokens.revoke("not-a-token").await,
            Err(ShareError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_keeps_revoked_tokens() {
        let (tokens, _) = manager();
        let expired = tokens.issue(1, 9, 1, 0).await.unwrap();
        let revoked = tokens.issue(1, 9, 1, 0).await.unwrap();
        let live = tokens.issue(1, 9, 5, 0).await.unwrap();
        tokens.revoke(&revoked.value).await.unwrap();

        assert_eq!(tokens.sweep_expired(2 * HOUR).await.unwrap(), 1);
        let remaining: Vec<_> = tokens
            .list_for(1)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        assert!(!remaining.contains(&expired.value));
        assert!(remaining.contains(&revoked.value));
        assert!(remaining.contains(&live.value));
    }
}
