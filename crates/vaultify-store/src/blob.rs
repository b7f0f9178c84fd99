//! Filesystem artifact store: one `<credential-uuid>.bin` file per credential.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vaultify_core::validation::validate_credential_uuid;

use crate::error::{Result, StoreError};
use crate::traits::BlobStore;

const EXTENSION: &str = "bin";

/// Stores ciphertext artifacts as flat files in one directory.
///
/// Ids must be canonical lowercase UUIDs; anything else is rejected before
/// touching the filesystem, so an id can never escape the directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Open (or create) the artifact directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact with this id lives at.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_credential_uuid(id).map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        let tmp = path.with_extension("bin.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).unwrap();
        let id = new_id();

        blobs.put(&id, b"\x00ciphertext").await.unwrap();
        assert!(dir.path().join(format!("{id}.bin")).exists());
        assert_eq!(blobs.get(&id).await.unwrap().unwrap(), b"\x00ciphertext");
        assert_eq!(blobs.list().await.unwrap(), vec![id.clone()]);

        assert!(blobs.delete(&id).await.unwrap());
        assert!(!blobs.delete(&id).await.unwrap());
        assert!(blobs.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_deletes_race_harmlessly() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).unwrap();
        let id = new_id();
        blobs.put(&id, b"x").await.unwrap();

        let (a, b) = tokio::join!(blobs.delete(&id), blobs.delete(&id));
        let removed = [a.unwrap(), b.unwrap()];
        assert_eq!(removed.iter().filter(|r| **r).count(), 1);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).unwrap();
        for bad in ["../escape", "a/b", "", "not-a-uuid"] {
            assert!(matches!(
                blobs.put(bad, b"x").await,
                Err(StoreError::InvalidData(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        assert!(blobs.list().await.unwrap().is_empty());
    }
}
