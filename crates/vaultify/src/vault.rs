//! The Vault: one handle over accounts, credentials and shares.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use vaultify_core::hash::{
    add_credential_data_hash, anchor_data_hash, delete_credential_data_hash, login_data_hash,
    register_data_hash, revoke_data_hash, sha256_hex,
};
use vaultify_core::validation::{require_non_empty, validate_token_format};
use vaultify_core::{
    now_millis, Certificate, Credential, LedgerAction, LedgerBlock, PublicKey, RecordId, Token,
    User,
};
use vaultify_ledger::{BlockEntry, HttpLedgerClient, LedgerAnchor};
use vaultify_share::{
    CertificateIssuer, CertificateVerifier, Signer, TokenManager, TokenValidation, Verification,
};
use vaultify_store::{
    BlobStore, DualStore, FileStore, FsBlobStore, MetadataStore, SqliteStore,
};

use crate::accounts::{Accounts, Session};
use crate::config::VaultConfig;
use crate::context::ExecutionContext;
use crate::envelope::EnvelopeEngine;
use crate::error::{Result, VaultError};
use crate::reconcile::{self, DriftReport};

/// Activity log action names not shared with the ledger.
mod activity {
    pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
    pub const RETRIEVE_CREDENTIAL: &str = "RETRIEVE_CREDENTIAL";
    pub const VERIFY_CERTIFICATE: &str = "VERIFY_CERTIFICATE";
}

/// Result of sharing a credential.
///
/// `token.value` is the secret to hand to the recipient together with the
/// certificate file. Neither the certificate nor the ledger contains it.
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub token: Token,
    pub certificate: Certificate,
    pub certificate_path: PathBuf,
}

/// Counts reported by [`Vault::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultStats {
    pub users: u64,
    pub credentials: u64,
    pub tokens: u64,
    pub ledger_available: bool,
}

/// A personal credential vault.
pub struct Vault {
    config: VaultConfig,
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    ledger: Arc<dyn LedgerAnchor>,
    accounts: Accounts,
    envelope: EnvelopeEngine,
    tokens: TokenManager,
    issuer: CertificateIssuer,
    verifier: CertificateVerifier,
    context: ExecutionContext,
}

impl Vault {
    /// Open the vault described by `config` with its on-disk stores and
    /// the HTTP ledger client.
    ///
    /// Must run inside a Tokio runtime; background tasks start immediately.
    pub async fn open(config: VaultConfig) -> Result<Self> {
        tokio::fs::create_dir_all(config.data_dir()).await?;

        let primary = SqliteStore::open(config.database_path())?;
        let backup = FileStore::open(config.backup_dir())?;
        let store = Arc::new(DualStore::new(primary, backup, config.storage_mode));
        let blobs = Arc::new(FsBlobStore::open(config.credentials_dir())?);
        let ledger = Arc::new(HttpLedgerClient::new(config.ledger.clone())?);

        info!(
            data_dir = %config.data_dir().display(),
            storage = ?config.storage_mode,
            ledger = %config.ledger.base_url,
            "opening vault"
        );
        Self::with_components(config, store, blobs, ledger).await
    }

    /// Assemble a vault from explicit components.
    pub async fn with_components(
        config: VaultConfig,
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        ledger: Arc<dyn LedgerAnchor>,
    ) -> Result<Self> {
        let tokens = TokenManager::new(store.clone(), ledger.clone());
        let context = ExecutionContext::start(&config, tokens.clone())?;

        Ok(Self {
            accounts: Accounts::new(store.clone(), config.kdf, config.rsa_bits),
            envelope: EnvelopeEngine::new(blobs.clone()),
            issuer: CertificateIssuer::new(ledger.clone(), config.certificates_dir()),
            verifier: CertificateVerifier::new(ledger.clone()),
            tokens,
            context,
            config,
            store,
            blobs,
            ledger,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new user.
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        let user = self.accounts.register(username, password, now_millis()).await?;

        let ledger = self.ledger.clone();
        let (id, pem) = (user.id, user.public_key_pem.clone());
        let entry = BlockEntry::new(
            user.id,
            &user.username,
            LedgerAction::UserRegistered,
            register_data_hash(&user.username, &user.public_key_pem),
        );
        self.context.workers().spawn_detached(async move {
            if !ledger.register_public_key(id, &pem).await {
                warn!(user_id = id, "public key not published to ledger");
            }
            append(ledger.as_ref(), &entry).await;
        });

        self.record(LedgerAction::UserRegistered.as_str(), &user.username);
        Ok(user)
    }

    /// Authenticate and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let session = match self.accounts.login(username, password).await {
            Ok(session) => session,
            Err(e) => {
                self.record(activity::LOGIN_FAILED, username.trim());
                return Err(e);
            }
        };

        self.anchor(BlockEntry::new(
            session.user_id(),
            session.username(),
            LedgerAction::UserLogin,
            login_data_hash(session.username(), now_millis()),
        ));
        self.record(LedgerAction::UserLogin.as_str(), session.username());
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt and store a credential for the session's user.
    pub async fn add_credential(
        &self,
        session: &Session,
        filename: &str,
        plaintext: &[u8],
    ) -> Result<Credential> {
        require_non_empty(filename, "filename")?;
        let public_key = PublicKey::from_pem(session.public_key_pem())?;

        let mut credential = self
            .envelope
            .store(plaintext, filename, &public_key, session.user_id(), now_millis())
            .await?;

        credential.record_id = match self.store.insert_credential(&credential).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = self.envelope.delete(&credential.id).await {
                    warn!(credential = %credential.id, error = %cleanup, "orphaned artifact left behind");
                }
                return Err(e.into());
            }
        };

        self.anchor(
            BlockEntry::new(
                session.user_id(),
                session.username(),
                LedgerAction::AddCredential,
                add_credential_data_hash(&credential.id, &credential.plaintext_hash),
            )
            .with_credential(credential.record_id),
        );
        self.record(
            LedgerAction::AddCredential.as_str(),
            format!("{} added {}", session.username(), credential.filename),
        );
        Ok(credential)
    }

    /// Store the contents of a file, named after it.
    pub async fn import_file(&self, session: &Session, path: &Path) -> Result<Credential> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        self.add_credential(session, &filename, &bytes).await
    }

    /// Credentials owned by the session's user.
    pub async fn list_credentials(&self, session: &Session) -> Result<Vec<Credential>> {
        Ok(self.store.list_credentials(session.user_id()).await?)
    }

    /// Decrypt one of the session user's credentials.
    pub async fn retrieve_credential(
        &self,
        session: &Session,
        record_id: RecordId,
    ) -> Result<Vec<u8>> {
        let credential = self.owned_credential(session, record_id).await?;
        let plaintext = self
            .envelope
            .retrieve(&credential, session.private_key())
            .await?;

        if sha256_hex(&plaintext) != credential.plaintext_hash {
            warn!(record_id, "decrypted credential does not match its recorded hash");
        }
        self.record(
            activity::RETRIEVE_CREDENTIAL,
            format!("{} retrieved {}", session.username(), credential.filename),
        );
        Ok(plaintext)
    }

    /// Remove a credential's metadata and artifact. Owner only.
    pub async fn delete_credential(&self, session: &Session, record_id: RecordId) -> Result<()> {
        let credential = self.owned_credential(session, record_id).await?;

        self.store.delete_credential(record_id).await?;
        self.envelope.delete(&credential.id).await?;

        self.anchor(
            BlockEntry::new(
                session.user_id(),
                session.username(),
                LedgerAction::DeleteCredential,
                delete_credential_data_hash(&credential.id),
            )
            .with_credential(record_id),
        );
        self.record(
            LedgerAction::DeleteCredential.as_str(),
            format!("{} deleted {}", session.username(), credential.filename),
        );
        Ok(())
    }

    async fn owned_credential(&self, session: &Session, record_id: RecordId) -> Result<Credential> {
        let credential = self
            .store
            .get_credential(record_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("credential {record_id}")))?;
        if credential.owner_id != session.user_id() {
            return Err(VaultError::Security(format!(
                "credential {record_id} belongs to another user"
            )));
        }
        Ok(credential)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a share token and its certificate for one of the user's
    /// credentials. `None` uses the configured default lifetime.
    pub async fn share(
        &self,
        session: &Session,
        record_id: RecordId,
        ttl_hours: Option<i64>,
    ) -> Result<ShareGrant> {
        let credential = self.owned_credential(session, record_id).await?;
        let ttl_hours = ttl_hours.unwrap_or(self.config.default_token_ttl_hours);
        let now = now_millis();

        let token = self
            .tokens
            .issue(session.user_id(), record_id, ttl_hours, now)
            .await?;
        let token_hash = token.hash();

        let signer = Signer {
            user_id: session.user_id(),
            username: session.username(),
            private_key: session.private_key(),
            public_key_pem: session.public_key_pem(),
        };
        let issued = self.issuer.issue(&token, &credential, signer, now).await?;

        self.anchor(
            BlockEntry::new(
                session.user_id(),
                session.username(),
                LedgerAction::GenerateToken,
                anchor_data_hash(&token_hash, record_id),
            )
            .with_credential(record_id)
            .with_token_hash(token_hash),
        );
        self.record(
            LedgerAction::GenerateToken.as_str(),
            format!(
                "{} shared {} for {}h",
                session.username(),
                credential.filename,
                ttl_hours
            ),
        );

        Ok(ShareGrant {
            token,
            certificate: issued.certificate,
            certificate_path: issued.path,
        })
    }

    /// Revoke a share. Only its issuer may do so.
    pub async fn revoke_share(&self, session: &Session, token_value: &str) -> Result<Token> {
        validate_token_format(token_value)?;
        let token = self
            .store
            .get_token(token_value)
            .await?
            .ok_or_else(|| VaultError::NotFound("token".into()))?;
        if token.issuer_user_id != session.user_id() {
            return Err(VaultError::Security(
                "only the issuer can revoke this token".into(),
            ));
        }

        let token = self.tokens.revoke(token_value).await?;
        let token_hash = token.hash();

        self.anchor(
            BlockEntry::new(
                session.user_id(),
                session.username(),
                LedgerAction::TokenRevoked,
                revoke_data_hash(&token_hash),
            )
            .with_credential(token.credential_id)
            .with_token_hash(token_hash),
        );
        self.record(
            LedgerAction::TokenRevoked.as_str(),
            format!("{} revoked token {}", session.username(), token.id),
        );
        Ok(token)
    }

    /// Tokens the session's user has issued.
    pub async fn list_tokens(&self, session: &Session) -> Result<Vec<Token>> {
        Ok(self.tokens.list_for(session.user_id()).await?)
    }

    /// Check a presented token value against the local token table.
    pub async fn validate_token(&self, token_value: &str) -> Result<TokenValidation> {
        Ok(self.tokens.validate(token_value, now_millis()).await?)
    }

    /// Verify a certificate file against a presented token, now.
    pub async fn verify_certificate(&self, path: &Path, token: &str) -> Result<Verification> {
        self.verify_certificate_at(path, token, now_millis()).await
    }

    /// Verify a certificate file as of `now` (Unix ms).
    pub async fn verify_certificate_at(
        &self,
        path: &Path,
        token: &str,
        now: i64,
    ) -> Result<Verification> {
        let verification = self.verifier.verify_file(path, token, now).await?;
        self.record(activity::VERIFY_CERTIFICATE, verification.to_string());
        Ok(verification)
    }

    /// Delete expired, non-revoked tokens now instead of waiting for the sweeper.
    pub async fn sweep_expired_tokens(&self) -> Result<u64> {
        Ok(self.tokens.sweep_expired(now_millis()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger & Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Every block on the ledger.
    pub async fn ledger_blocks(&self) -> Result<Vec<LedgerBlock>> {
        self.require_ledger().await?;
        Ok(self.ledger.get_all_blocks().await)
    }

    /// Ask the ledger to verify its own hash chain.
    pub async fn verify_ledger(&self) -> Result<bool> {
        self.require_ledger().await?;
        Ok(self.ledger.verify_chain_integrity().await)
    }

    async fn require_ledger(&self) -> Result<()> {
        if self.ledger.is_available().await {
            Ok(())
        } else {
            Err(VaultError::LedgerUnavailable(
                "ledger service is not reachable".into(),
            ))
        }
    }

    pub async fn stats(&self) -> Result<VaultStats> {
        Ok(VaultStats {
            users: self.store.count_users().await?,
            credentials: self.store.list_all_credentials().await?.len() as u64,
            tokens: self.store.count_tokens().await?,
            ledger_available: self.ledger.is_available().await,
        })
    }

    /// Read-only drift report over metadata, artifacts and the ledger.
    pub async fn reconcile(&self) -> Result<DriftReport> {
        reconcile::reconcile(self.store.as_ref(), self.blobs.as_ref(), self.ledger.as_ref()).await
    }

    /// Wait until queued ledger appends have run.
    pub async fn flush_background(&self) {
        self.context.workers().wait_idle().await;
    }

    /// Stop the sweeper and drain background work.
    ///
    /// Returns false when a drain hit the shutdown timeout.
    pub async fn shutdown(&self) -> bool {
        let clean = self.context.shutdown().await;
        info!(clean, "vault shut down");
        clean
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a block in the background. Failure never reaches the caller.
    fn anchor(&self, entry: BlockEntry) {
        let ledger = self.ledger.clone();
        self.context
            .workers()
            .spawn_detached(async move { append(ledger.as_ref(), &entry).await });
    }

    fn record(&self, action: &str, details: impl Into<String>) {
        self.context.activity().record(action, details);
    }
}

async fn append(ledger: &dyn LedgerAnchor, entry: &BlockEntry) {
    if ledger.append_block(entry).await.is_none() {
        warn!(action = %entry.action, "ledger append skipped");
    }
}
