//! File storage for thumbnails and step images.
//!
//! Blobs are written before the owning database transaction and discarded
//! after it commits (for replaced files) or fails (for freshly staged ones).
//! Path format: `{root}/{key[0..2]}/{key[2..4]}/{key}`.

use crate::error::{ManualError, Result};
use crate::models::Upload;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage backend for attachment bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write data under `key`, replacing anything already there.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read the data stored under `key`.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the data under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether data exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Filesystem blob store.
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(ManualError::AttachmentNotFound {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(&key[0..2]).join(&key[2..4]).join(key))
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(key)?;
        debug!(key = %key, path = %path.display(), size = data.len(), "blob_store: write");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ManualError::io_with_path(e, parent))?;
        }

        // Temp file + rename so readers never see a partial blob
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| ManualError::io_with_path(e, &temp_path))?;
        file.write_all(data)
            .await
            .map_err(|e| ManualError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .await
            .map_err(|e| ManualError::io_with_path(e, &temp_path))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| ManualError::io_with_path(e, &path))?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ManualError::AttachmentNotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => Err(ManualError::io_with_path(e, path)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ManualError::io_with_path(e, path)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.blob_path(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| ManualError::io_with_path(e, path))
    }
}

/// A blob written to storage but not yet referenced by any row.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBlob {
    pub key: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub byte_size: i64,
    pub checksum: String,
}

/// Attachment operations on top of a [`BlobStore`].
#[derive(Clone)]
pub struct Attachments {
    backend: Arc<dyn BlobStore>,
}

impl Attachments {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        Self { backend }
    }

    /// Write an upload under a fresh key.
    pub async fn stage(&self, upload: &Upload) -> Result<StagedBlob> {
        let key = generate_key();
        self.backend.write(&key, &upload.data).await?;

        Ok(StagedBlob {
            key,
            filename: sanitize_filename(&upload.filename),
            content_type: upload
                .content_type
                .as_ref()
                .filter(|ct| !ct.trim().is_empty())
                .cloned(),
            byte_size: upload.data.len() as i64,
            checksum: compute_checksum(&upload.data),
        })
    }

    /// Delete blobs no row refers to anymore. Failures are logged, not returned.
    pub async fn discard<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            match self.backend.delete(key).await {
                Ok(()) => debug!("Discarded blob {}", key),
                Err(e) => warn!("Failed to discard blob {}: {}", key, e),
            }
        }
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.backend.read(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }
}

/// Fresh random blob key (32 lowercase hex chars).
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_valid_key(key: &str) -> bool {
    key.len() == 32 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// BLAKE3 digest with a `blake3:` prefix.
pub fn compute_checksum(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data).to_hex())
}

/// Final path component of a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_attachments() -> (Attachments, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBlobStore::new(temp_dir.path().join("storage"));
        (Attachments::new(Arc::new(backend)), temp_dir)
    }

    #[tokio::test]
    async fn test_stage_read_discard() {
        let (attachments, _temp) = create_test_attachments();
        let upload = Upload::new("photos/cover.png", Some("image/png".into()), b"png-bytes".to_vec());

        let staged = attachments.stage(&upload).await.unwrap();
        assert!(is_valid_key(&staged.key));
        assert_eq!(staged.filename, "cover.png");
        assert_eq!(staged.byte_size, 9);
        assert_eq!(staged.checksum, compute_checksum(b"png-bytes"));
        assert_eq!(attachments.read(&staged.key).await.unwrap(), b"png-bytes");

        attachments.discard([staged.key.as_str()]).await;
        assert!(!attachments.exists(&staged.key).await.unwrap());
        assert!(matches!(
            attachments.read(&staged.key).await,
            Err(ManualError::AttachmentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_disk_layout_uses_key_prefixes() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskBlobStore::new(temp_dir.path());
        let key = "abcdef0123456789abcdef0123456789";

        store.write(key, b"data").await.unwrap();
        assert!(temp_dir.path().join("ab").join("cd").join(key).exists());
        assert!(store.exists(key).await.unwrap());

        store.delete(key).await.unwrap();
        // Deleting twice is fine
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = DiskBlobStore::new(temp_dir.path());

        for key in ["../../etc/passwd", "short", "ABCDEF0123456789ABCDEF0123456789"] {
            assert!(matches!(
                store.read(key).await,
                Err(ManualError::AttachmentNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\step.jpg"), "step.jpg");
        assert_eq!(sanitize_filename("../"), "upload");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("thumb.webp"), "thumb.webp");
    }
}
