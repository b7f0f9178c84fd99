//! Certificate issuance.
//!
//! Binds a share token to a credential in a signed statement, anchored on
//! the ledger when it is reachable. Issuance never fails because the ledger
//! is down: the certificate is produced with an empty `ledgerBlockHash` and
//! will fail online verification later.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use vaultify_core::hash::anchor_data_hash;
use vaultify_core::{
    Certificate, Credential, LedgerAction, PrivateKey, SignedPayload, Token, UserId,
};
use vaultify_ledger::{BlockEntry, LedgerAnchor};

use crate::codec;
use crate::error::Result;

/// The identity signing a certificate.
#[derive(Clone, Copy)]
pub struct Signer<'a> {
    pub user_id: UserId,
    pub username: &'a str,
    pub private_key: &'a PrivateKey,
    pub public_key_pem: &'a str,
}

/// A certificate and where it was written.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    pub path: PathBuf,
}

/// Builds, signs, anchors and persists share certificates.
#[derive(Clone)]
pub struct CertificateIssuer {
    ledger: Arc<dyn LedgerAnchor>,
    certificate_dir: PathBuf,
}

impl CertificateIssuer {
    /// Issuer writing certificate files into `certificate_dir`.
    pub fn new(ledger: Arc<dyn LedgerAnchor>, certificate_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger,
            certificate_dir: certificate_dir.into(),
        }
    }

    /// Directory certificate files are written to.
    pub fn certificate_dir(&self) -> &Path {
        &self.certificate_dir
    }

    /// Issue a certificate for `token` over `credential`.
    ///
    /// Signing and file errors are hard failures. Ledger failures only
    /// degrade the result.
    pub async fn issue(
        &self,
        token: &Token,
        credential: &Credential,
        signer: Signer<'_>,
        now: i64,
    ) -> Result<IssuedCertificate> {
        let token_hash = token.hash();
        let credential_id = credential.record_id;
        let data_hash = anchor_data_hash(&token_hash, credential_id);

        let entry = BlockEntry::new(
            signer.user_id,
            signer.username,
            LedgerAction::CertGenerated,
            data_hash,
        )
        .with_credential(credential_id)
        .with_token_hash(token_hash.clone());

        let ledger_block_hash = match self.ledger.append_block(&entry).await {
            Some(block) => block.hash,
            None => {
                warn!(credential_id, "certificate issued without ledger anchor");
                String::new()
            }
        };

        let payload = SignedPayload {
            issuer_user_id: signer.user_id,
            credential_id,
            token_hash: token_hash.clone(),
            expiry: token.expiry,
            ledger_block_hash: ledger_block_hash.clone(),
        };
        let signature = payload.sign(signer.private_key)?;

        let mut certificate = Certificate {
            token_hash,
            credential_id,
            issuer_user_id: signer.user_id,
            credential_hash: credential.ciphertext_hash.clone(),
            issuer_public_key_pem: signer.public_key_pem.to_owned(),
            payload_hash: String::new(),
            signature_base64: BASE64.encode(signature),
            expiry_epoch_ms: token.expiry,
            created_at_ms: now,
            ledger_block_hash,
        };
        certificate.payload_hash = certificate.compute_payload_hash();

        if !self.ledger.store_certificate(&certificate).await {
            warn!(credential_id, "certificate not registered on ledger");
        }

        let path = codec::save(&self.certificate_dir, &certificate).await?;
        debug!(
            credential_id,
            anchored = certificate.is_anchored(),
            path = %path.display(),
            "certificate issued"
        );
        Ok(IssuedCertificate { certificate, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{keypair, sample_credential, sample_token};
    use vaultify_core::PublicKey;
    use vaultify_ledger::MemoryLedger;

    async fn issue_with(ledger: Arc<MemoryLedger>) -> (IssuedCertificate, Token, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let issuer = CertificateIssuer::new(ledger, dir.path());
        let keys = keypair();
        let pem = keys.public_key().to_pem().unwrap();
        let token = sample_token(1_000_000);
        let signer = Signer {
            user_id: 1,
            username: "alice",
            private_key: keys.private_key(),
            public_key_pem: &pem,
        };
        let issued = issuer
            .issue(&token, &sample_credential(), signer, 500)
            .await
            .unwrap();
        (issued, token, dir)
    }

    #[tokio::test]
    async fn test_anchored_certificate() {
        let ledger = Arc::new(MemoryLedger::new());
        let (issued, token, _dir) = issue_with(ledger.clone()).await;
        let cert = &issued.certificate;

        assert_eq!(cert.token_hash, token.hash());
        assert_eq!(cert.payload_hash, cert.compute_payload_hash());
        assert_eq!(cert.credential_hash, sample_credential().ciphertext_hash);
        assert!(cert.is_anchored());

        let block = ledger.get_block_by_hash(&cert.ledger_block_hash).await.unwrap();
        assert_eq!(block.action, "CERT_GENERATED");
        assert_eq!(block.data_hash, cert.anchor_data_hash());

        let registered = ledger.get_certificate(&cert.token_hash).await.unwrap();
        assert_eq!(registered.signature, cert.signature_base64);

        let signature = BASE64.decode(&cert.signature_base64).unwrap();
        let public = PublicKey::from_pem(&cert.issuer_public_key_pem).unwrap();
        cert.signed_payload().verify(&public, &signature).unwrap();

        assert_eq!(codec::load(&issued.path).await.unwrap(), *cert);
    }

    #[tokio::test]
    async fn test_ledger_outage_yields_unanchored_certificate() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_available(false);
        let (issued, _, _dir) = issue_with(ledger.clone()).await;

        assert_eq!(issued.certificate.ledger_block_hash, "");
        assert!(issued.path.exists());
        ledger.set_available(true);
        assert!(ledger.get_certificate(&issued.certificate.token_hash).await.is_none());
    }

    #[tokio::test]
    async fn test_raw_token_never_persisted() {
        let ledger = Arc::new(MemoryLedger::new());
        let (issued, token, _dir) = issue_with(ledger.clone()).await;

        let file = std::fs::read_to_string(&issued.path).unwrap();
        assert!(!file.contains(&token.value));
        for block in ledger.get_all_blocks().await {
            assert!(!serde_json::to_string(&block).unwrap().contains(&token.value));
        }
    }
}
