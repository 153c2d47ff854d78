use crate::backend::StorageBackend;
use archive_model::StorageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Filesystem-backed container rooted at `location` (spec `storage.local`).
/// Used for the working directory S and W shell out against, and can also
/// stand in for the public/private containers in development.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.resolve(key)).await?)
    }

    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key);
        fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::Io(e),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn local_path(&self, key: &str) -> Option<PathBuf> {
        Some(self.resolve(key))
    }
}

impl LocalBackend {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());

        assert!(!backend.exists("a/b.txt").await.unwrap());
        backend.save("a/b.txt", b"hello".to_vec()).await.unwrap();
        assert!(backend.exists("a/b.txt").await.unwrap());
        assert_eq!(backend.load("a/b.txt").await.unwrap(), b"hello");

        backend.delete("a/b.txt").await.unwrap();
        assert!(!backend.exists("a/b.txt").await.unwrap());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let err = backend.load("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
