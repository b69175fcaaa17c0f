//! Object storage for document bytes, addressed by bucket and relative path.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },
}

/// Storage backend for uploaded files. Writes overwrite an existing object at the same path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove an object; removing a missing object succeeds.
    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError>;

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError>;
}

/// Stores objects as plain files under `{root}/{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        for part in [bucket, path] {
            let relative = Path::new(part);
            let is_plain = relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if part.is_empty() || !is_plain {
                return Err(StorageError::InvalidPath(part.to_string()));
            }
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full_path = self.full_path(bucket, path)?;
        debug!(bucket, storage_path = %path, size = data.len(), "storage: put");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // temp file + rename so readers never observe a partial object
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "storage: rename failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.full_path(bucket, path)?;
        match fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let full_path = self.full_path(bucket, path)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool, StorageError> {
        let full_path = self.full_path(bucket, path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());

        store.put("documentos-proyectos", "p1/general/a.pdf", b"v1").await.unwrap();
        store.put("documentos-proyectos", "p1/general/a.pdf", b"v2").await.unwrap();
        assert_eq!(store.get("documentos-proyectos", "p1/general/a.pdf").await.unwrap(), b"v2");

        store.remove("documentos-proyectos", "p1/general/a.pdf").await.unwrap();
        assert!(!store.exists("documentos-proyectos", "p1/general/a.pdf").await.unwrap());
        // second remove is a no-op
        store.remove("documentos-proyectos", "p1/general/a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        let err = store.get("documentos-clientes", "nope.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        let err = store.put("documentos-clientes", "../outside.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        let err = store.put("documentos-clientes", "/etc/passwd", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }
}
