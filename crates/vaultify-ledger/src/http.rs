//! HTTP/JSON client for the external ledger service.
//!
//! Status handling follows one rule: the documented success status is
//! success, 404 on a lookup is a valid "not found", and anything else
//! (other statuses, timeouts, refused connections, bad bodies) means the
//! service is unavailable. The fallible `try_*` methods report which; the
//! [`LedgerAnchor`] impl logs and degrades.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use vaultify_core::{Certificate, LedgerBlock, UserId};

use crate::error::{LedgerError, Result};
use crate::messages::{
    paths, BlockEntry, BlockEnvelope, BlockList, CertificateRecord, ChainStatus,
    PublicKeyRecord, RevocationStatus, RevokeRequest,
};
use crate::traits::LedgerAnchor;

/// Default ledger service base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Configuration for [`HttpLedgerClient`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL every contract path is appended to.
    pub base_url: String,
    /// TCP connect timeout (default: 10 seconds).
    pub connect_timeout: Duration,
    /// Whole-request timeout (default: 10 seconds).
    pub request_timeout: Duration,
    /// Timeout for the health probe (default: 5 seconds).
    pub health_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl LedgerConfig {
    /// Default timeouts against a specific base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Ledger client over reqwest.
///
/// Cheap to share behind an `Arc`; reqwest pools connections internally.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    config: LedgerConfig,
    http: reqwest::Client,
}

impl HttpLedgerClient {
    /// Build a client from configuration.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("vaultify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    // The health endpoint hangs off the service origin, not the API base.
    fn health_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let origin = base.strip_suffix("/api").unwrap_or(base);
        format!("{origin}{}", paths::HEALTH)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fallible calls
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /ledger/blocks`, expecting 201.
    pub async fn try_append_block(&self, entry: &BlockEntry) -> Result<LedgerBlock> {
        let resp = self.http.post(self.url(paths::BLOCKS)).json(entry).send().await?;
        let envelope: BlockEnvelope = expect_json(resp, &[StatusCode::CREATED], paths::BLOCKS).await?;
        Ok(envelope.block)
    }

    /// `GET /ledger/blocks`.
    pub async fn try_get_all_blocks(&self) -> Result<Vec<LedgerBlock>> {
        let resp = self.http.get(self.url(paths::BLOCKS)).send().await?;
        let list: BlockList = expect_json(resp, &[StatusCode::OK], paths::BLOCKS).await?;
        Ok(list.blocks)
    }

    /// `GET /ledger/blocks/{hash}`; 404 is `Ok(None)`.
    pub async fn try_get_block_by_hash(&self, hash: &str) -> Result<Option<LedgerBlock>> {
        let Some(hash) = path_segment(hash) else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(self.url(&format!("{}/{hash}", paths::BLOCKS)))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_json(resp, &[StatusCode::OK], paths::BLOCKS).await.map(Some)
    }

    /// `GET /ledger/verify`.
    pub async fn try_verify_chain(&self) -> Result<bool> {
        let resp = self.http.get(self.url(paths::VERIFY)).send().await?;
        let status: ChainStatus = expect_json(resp, &[StatusCode::OK], paths::VERIFY).await?;
        Ok(status.valid)
    }

    /// `POST /certificates`, expecting 201.
    pub async fn try_store_certificate(&self, certificate: &Certificate) -> Result<()> {
        let record = CertificateRecord::from(certificate);
        let resp = self
            .http
            .post(self.url(paths::CERTIFICATES))
            .json(&record)
            .send()
            .await?;
        expect_status(&resp, &[StatusCode::CREATED], paths::CERTIFICATES)
    }

    /// `GET /certificates/{tokenHash}`; 404 is `Ok(None)`.
    pub async fn try_get_certificate(&self, token_hash: &str) -> Result<Option<CertificateRecord>> {
        let Some(token_hash) = path_segment(token_hash) else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(self.url(&format!("{}/{token_hash}", paths::CERTIFICATES)))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_json(resp, &[StatusCode::OK], paths::CERTIFICATES)
            .await
            .map(Some)
    }

    /// `POST /tokens/revoked`, expecting 200 or 201.
    pub async fn try_revoke_token(&self, token_hash: &str) -> Result<()> {
        let body = RevokeRequest {
            token_hash: token_hash.to_owned(),
        };
        let resp = self
            .http
            .post(self.url(paths::REVOKED_TOKENS))
            .json(&body)
            .send()
            .await?;
        expect_status(
            &resp,
            &[StatusCode::OK, StatusCode::CREATED],
            paths::REVOKED_TOKENS,
        )
    }

    /// `GET /tokens/revoked/{tokenHash}`.
    pub async fn try_is_token_revoked(&self, token_hash: &str) -> Result<bool> {
        let Some(token_hash) = path_segment(token_hash) else {
            return Ok(false);
        };
        let resp = self
            .http
            .get(self.url(&format!("{}/{token_hash}", paths::REVOKED_TOKENS)))
            .send()
            .await?;
        let status: RevocationStatus =
            expect_json(resp, &[StatusCode::OK], paths::REVOKED_TOKENS).await?;
        Ok(status.is_revoked)
    }

    /// `POST /users/{id}/public-key`, expecting 200 or 201.
    pub async fn try_register_public_key(&self, user_id: UserId, public_key_pem: &str) -> Result<()> {
        let body = PublicKeyRecord {
            public_key: public_key_pem.to_owned(),
        };
        let resp = self
            .http
            .post(self.url(&format!("{}/{user_id}/public-key", paths::USERS)))
            .json(&body)
            .send()
            .await?;
        expect_status(&resp, &[StatusCode::OK, StatusCode::CREATED], paths::USERS)
    }

    /// `GET /users/{id}/public-key`; 404 is `Ok(None)`.
    pub async fn try_get_public_key(&self, user_id: UserId) -> Result<Option<String>> {
        let resp = self
            .http
            .get(self.url(&format!("{}/{user_id}/public-key", paths::USERS)))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: PublicKeyRecord = expect_json(resp, &[StatusCode::OK], paths::USERS).await?;
        Ok(Some(record.public_key))
    }

    /// `GET /api/health` with the short health timeout.
    pub async fn try_health(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.health_url())
            .timeout(self.config.health_timeout)
            .send()
            .await?;
        expect_status(&resp, &[StatusCode::OK], paths::HEALTH)
    }
}

// Identifiers are interpolated into paths; anything other than a plain
// alphanumeric token cannot exist on the ledger and is never sent.
fn path_segment(id: &str) -> Option<&str> {
    let ok = !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric());
    if !ok {
        debug!(id, "refusing to look up non-alphanumeric ledger id");
    }
    ok.then_some(id)
}

fn expect_status(resp: &Response, ok: &[StatusCode], endpoint: &str) -> Result<()> {
    if ok.contains(&resp.status()) {
        Ok(())
    } else {
        Err(LedgerError::UnexpectedStatus {
            status: resp.status().as_u16(),
            endpoint: endpoint.to_owned(),
        })
    }
}

async fn expect_json<T: DeserializeOwned>(
    resp: Response,
    ok: &[StatusCode],
    endpoint: &str,
) -> Result<T> {
    expect_status(&resp, ok, endpoint)?;
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn degrade<T>(op: &'static str, result: Result<T>, fallback: T) -> T {
    result.unwrap_or_else(|e| {
        warn!(op, error = %e, "ledger call failed");
        fallback
    })
}

#[async_trait]
impl LedgerAnchor for HttpLedgerClient {
    async fn append_block(&self, entry: &BlockEntry) -> Option<LedgerBlock> {
        match self.try_append_block(entry).await {
            Ok(block) => {
                debug!(index = block.index, action = %block.action, "ledger block appended");
                Some(block)
            }
            Err(e) => {
                warn!(action = %entry.action, error = %e, "ledger append failed");
                None
            }
        }
    }

    async fn get_all_blocks(&self) -> Vec<LedgerBlock> {
        degrade("get_all_blocks", self.try_get_all_blocks().await, Vec::new())
    }

    async fn get_block_by_hash(&self, hash: &str) -> Option<LedgerBlock> {
        degrade("get_block_by_hash", self.try_get_block_by_hash(hash).await, None)
    }

    async fn verify_chain_integrity(&self) -> bool {
        degrade("verify_chain_integrity", self.try_verify_chain().await, false)
    }

    async fn store_certificate(&self, certificate: &Certificate) -> bool {
        self.try_store_certificate(certificate)
            .await
            .map_err(|e| warn!(error = %e, "certificate registration failed"))
            .is_ok()
    }

    async fn get_certificate(&self, token_hash: &str) -> Option<CertificateRecord> {
        degrade("get_certificate", self.try_get_certificate(token_hash).await, None)
    }

    async fn revoke_token(&self, token_hash: &str) -> bool {
        self.try_revoke_token(token_hash)
            .await
            .map_err(|e| warn!(error = %e, "remote revocation failed"))
            .is_ok()
    }

    async fn is_token_revoked(&self, token_hash: &str) -> bool {
        degrade("is_token_revoked", self.try_is_token_revoked(token_hash).await, false)
    }

    async fn register_public_key(&self, user_id: UserId, public_key_pem: &str) -> bool {
        self.try_register_public_key(user_id, public_key_pem)
            .await
            .map_err(|e| warn!(user_id, error = %e, "public key registration failed"))
            .is_ok()
    }

    async fn get_public_key(&self, user_id: UserId) -> Option<String> {
        degrade("get_public_key", self.try_get_public_key(user_id).await, None)
    }

    async fn is_available(&self) -> bool {
        match self.try_health().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "ledger health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpLedgerClient {
        HttpLedgerClient::new(LedgerConfig::with_base_url(base)).unwrap()
    }

    #[test]
    fn test_urls() {
        let c = client("http://ledger.local/api/");
        assert_eq!(c.url(paths::BLOCKS), "http://ledger.local/api/ledger/blocks");
        assert_eq!(c.health_url(), "http://ledger.local/api/health");

        let c = client("http://ledger.local");
        assert_eq!(c.health_url(), "http://ledger.local/api/health");
    }

    #[test]
    fn test_path_segment_rejects_traversal() {
        assert_eq!(path_segment("abc123"), Some("abc123"));
        assert_eq!(path_segment(""), None);
        assert_eq!(path_segment("../verify"), None);
        assert_eq!(path_segment("a/b"), None);
    }

    #[test]
    fn test_default_timeouts() {
        let config = LedgerConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.health_timeout, Duration::from_secs(5));
    }
}
