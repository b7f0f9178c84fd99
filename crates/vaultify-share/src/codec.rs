//! Certificate files.
//!
//! A certificate is written as pretty JSON to `cert-<tokenHash>.json` and
//! read back strictly: unknown fields, missing fields and wrong types are
//! all rejected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use vaultify_core::{Certificate, ValidationError};

use crate::error::{Result, ShareError};

/// File name a certificate is stored under.
pub fn certificate_file_name(token_hash: &str) -> String {
    format!("cert-{token_hash}.json")
}

/// Write a certificate into `dir`, replacing any previous file atomically.
pub async fn save(dir: &Path, certificate: &Certificate) -> Result<PathBuf> {
    if !certificate
        .token_hash
        .bytes()
        .all(|b| b.is_ascii_hexdigit())
    {
        return Err(ValidationError::Malformed {
            what: "certificate",
            reason: "token hash is not hex".into(),
        }
        .into());
    }
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(certificate_file_name(&certificate.token_hash));
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, certificate.to_json_pretty()?).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(path)
}

/// Read and strictly parse a certificate file.
pub async fn load(path: &Path) -> Result<Certificate> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ShareError::CertificateNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Certificate::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_certificate;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cert = sample_certificate();

        let path = save(dir.path(), &cert).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("cert-{}.json", cert.token_hash)
        );
        assert_eq!(load(&path).await.unwrap(), cert);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert-nope.json");
        assert!(matches!(
            load(&path).await,
            Err(ShareError::CertificateNotFound(p)) if p == path
        ));
    }

    #[tokio::test]
    async fn test_unknown_fields_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.json");
        let mut json: serde_json::Value =
            serde_json::to_value(sample_certificate()).unwrap();
        json["extra"] = serde_json::json!(true);
        tokio::fs::write(&path, json.to_string()).await.unwrap();

        assert!(matches!(load(&path).await, Err(ShareError::Validation(_))));
    }

    #[tokio::test]
    async fn test_wrong_field_case_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.json");
        let json = serde_json::to_string(&sample_certificate())
            .unwrap()
            .replace("\"tokenHash\"", "\"TokenHash\"");
        tokio::fs::write(&path, json).await.unwrap();

        assert!(matches!(load(&path).await, Err(ShareError::Validation(_))));
    }
}
