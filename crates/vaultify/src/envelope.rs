//! Envelope encryption of stored credentials.
//!
//! Each credential gets its own AES-256-GCM key and IV. The ciphertext
//! artifact (`IV ‖ ct ‖ tag`) goes to the [`BlobStore`]; the key goes into
//! the metadata wrapped under the owner's RSA public key.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;
use vaultify_core::hash::sha256_hex;
use vaultify_core::{ContentKey, Credential, CryptoError, Iv, PrivateKey, PublicKey, UserId};
use vaultify_store::BlobStore;

use crate::error::{Result, VaultError};

/// Encrypts, stores, decrypts and removes credential artifacts.
///
/// Holds no per-call state: any number of callers may use one engine
/// concurrently on distinct credentials.
#[derive(Clone)]
pub struct EnvelopeEngine {
    blobs: Arc<dyn BlobStore>,
}

impl EnvelopeEngine {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Encrypt `plaintext` for `owner` and persist the artifact.
    ///
    /// The returned metadata has `record_id == 0`; the metadata store
    /// assigns one on insert.
    pub async fn store(
        &self,
        plaintext: &[u8],
        filename: &str,
        owner_public_key: &PublicKey,
        owner_id: UserId,
        now: i64,
    ) -> Result<Credential> {
        let id = uuid::Uuid::new_v4().to_string();
        let key = ContentKey::generate();
        let iv = Iv::generate();

        let blob = key.encrypt_with_iv(plaintext, &iv)?;
        let wrapped = owner_public_key.wrap_key(&key)?;

        self.blobs.put(&id, &blob).await?;
        debug!(credential = %id, bytes = blob.len(), "credential artifact stored");

        Ok(Credential {
            record_id: 0,
            id,
            owner_id,
            filename: filename.to_owned(),
            plaintext_hash: sha256_hex(plaintext),
            ciphertext_hash: sha256_hex(&blob),
            file_size: plaintext.len() as u64,
            created_at: now,
            wrapped_key: BASE64.encode(wrapped),
            iv: iv.to_base64(),
        })
    }

    /// Decrypt a stored credential with its owner's private key.
    ///
    /// A wrong key and a damaged artifact fail identically.
    pub async fn retrieve(&self, credential: &Credential, private_key: &PrivateKey) -> Result<Vec<u8>> {
        let blob = self
            .blobs
            .get(&credential.id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("credential artifact {}", credential.id)))?;

        let wrapped = BASE64
            .decode(credential.wrapped_key.as_bytes())
            .map_err(|_| CryptoError::Decryption)?;
        let key = private_key.unwrap_key(&wrapped)?;
        Ok(key.decrypt(&blob)?)
    }

    /// Remove an artifact. Removing a missing one is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.blobs.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{keypair, other_keypair};
    use vaultify_store::MemoryBlobStore;

    async fn stored(plaintext: &[u8]) -> (EnvelopeEngine, Arc<MemoryBlobStore>, Credential) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let engine = EnvelopeEngine::new(blobs.clone());
        let cred = engine
            .store(plaintext, "notes.txt", keypair().public_key(), 1, 10)
            .await
            .unwrap();
        (engine, blobs, cred)
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let (engine, blobs, cred) = stored(b"db password: hunter2").await;

        assert_eq!(cred.file_size, 20);
        assert_eq!(cred.plaintext_hash, sha256_hex(b"db password: hunter2"));
        let blob = blobs.get(&cred.id).await.unwrap().unwrap();
        assert_eq!(cred.ciphertext_hash, sha256_hex(&blob));
        assert_eq!(BASE64.decode(&cred.iv).unwrap(), blob[..12]);

        let plain = engine.retrieve(&cred, keypair().private_key()).await.unwrap();
        assert_eq!(plain, b"db password: hunter2");
    }

    #[tokio::test]
    async fn test_wrong_key_and_tamper_fail_alike() {
        let (engine, blobs, cred) = stored(b"secret").await;

        let wrong = engine.retrieve(&cred, other_keypair().private_key()).await;
        assert!(matches!(wrong, Err(VaultError::Crypto(CryptoError::Decryption))));

        blobs.tamper(&cred.id, |b| b[14] ^= 0x01).unwrap();
        let tampered = engine.retrieve(&cred, keypair().private_key()).await;
        assert!(matches!(tampered, Err(VaultError::Crypto(CryptoError::Decryption))));
        assert_eq!(
            wrong.unwrap_err().to_string(),
            tampered.unwrap_err().to_string()
        );
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let (engine, _, cred) = stored(b"secret").await;
        assert!(engine.delete(&cred.id).await.unwrap());
        assert!(!engine.delete(&cred.id).await.unwrap());
        assert!(matches!(
            engine.retrieve(&cred, keypair().private_key()).await,
            Err(VaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_key_per_credential() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let engine = EnvelopeEngine::new(blobs.clone());
        let a = engine.store(b"same", "a", keypair().public_key(), 1, 0).await.unwrap();
        let b = engine.store(b"same", "b", keypair().public_key(), 1, 0).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.ciphertext_hash, b.ciphertext_hash);
        assert_ne!(a.wrapped_key, b.wrapped_key);
    }
}
