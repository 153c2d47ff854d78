use archive_model::StorageError;
use async_trait::async_trait;
use std::path::PathBuf;

/// A single storage container: the working-directory filesystem, or one
/// of the two CDN-facing containers (public/private, spec §2). F, S, W
/// and P address objects through this trait only — none of them knows
/// whether a container is local or S3-backed.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// A filesystem path to the object, if this backend can expose one.
    /// S and W shell out to `ffmpeg`/`sox`, which need real paths; local
    /// storage can hand one back directly, S3 cannot and callers must
    /// `load` the bytes to a temp file themselves.
    fn local_path(&self, _key: &str) -> Option<PathBuf> {
        None
    }
}
