use archive_db::ArchiveStore;
use archive_model::{ArchiveStream, PersisterError};
use archive_storage::{Container, StoragePools};
use tracing::info;

/// Persister (P, spec §4.8): copies each finished stream from the
/// working pool into its CDN container and records its metadata. Skips
/// the upload if the destination already has the object and fails the
/// whole batch (no partial writes) if any path is already recorded.
pub struct Persister {
    storage: StoragePools,
    archives: ArchiveStore,
}

impl Persister {
    pub fn new(storage: StoragePools, archives: ArchiveStore) -> Self {
        Self { storage, archives }
    }

    /// `session_id` ties every stream in the manifest to one `ChatArchive`
    /// row group; `streams` have already passed through F/S/W.
    pub async fn persist(
        &self,
        session_id: i64,
        streams: &[ArchiveStream],
    ) -> Result<(), PersisterError> {
        for stream in streams {
            self.upload_one(stream).await?;
            if let Some(waveform_filename) = &stream.waveform_filename {
                self.upload_named(Container::Work, Container::Public, waveform_filename)
                    .await?;
            }
        }

        self.archives.persist_streams(session_id, streams)?;
        info!(session_id, count = streams.len(), "persisted archive streams");
        Ok(())
    }

    async fn upload_one(&self, stream: &ArchiveStream) -> Result<(), PersisterError> {
        let destination = if stream.stream_type.is_public() {
            Container::Public
        } else {
            Container::Private
        };
        self.upload_named(Container::Work, destination, &stream.filename).await
    }

    async fn upload_named(
        &self,
        from: Container,
        to: Container,
        key: &str,
    ) -> Result<(), PersisterError> {
        let destination = self.storage.get(to);
        let dest_handle = destination.acquire().await?;
        if dest_handle.exists(key).await? {
            return Ok(());
        }

        let source = self.storage.get(from);
        let bytes = {
            let source_handle = source.acquire().await?;
            source_handle.load(key).await?
        };
        dest_handle.save(key, bytes).await?;
        Ok(())
    }
}
