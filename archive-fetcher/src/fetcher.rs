use crate::provider::{ProviderClient, ProviderRecording, RecordingKind};
use archive_model::{ArchiveManifest, ArchiveStream, ArchiveStreamType, FetcherError};
use archive_storage::StoragePool;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// The opaque `jobs.data` payload F expects: the set of provider call ids
/// a producer recorded for this session. Everything else (length, offset,
/// participant) is discovered from the provider's own listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchJobData {
    pub call_ids: Vec<String>,
}

impl FetchJobData {
    pub fn from_bytes(data: &[u8]) -> Result<Self, FetcherError> {
        serde_json::from_slice(data).map_err(|e| FetcherError::BadJobData(e.to_string()))
    }
}

pub struct Fetcher {
    provider: ProviderClient,
    storage: StoragePool,
}

impl Fetcher {
    pub fn new(provider: ProviderClient, storage: StoragePool) -> Self {
        Self { provider, storage }
    }

    /// Downloads every per-participant recording for `session_id` to the
    /// local storage pool under `{base_name}-{call_id}.{ext}`, returning
    /// `None` when the session has no recordings at all (spec §4.4 stage
    /// 1: "log 'no archive' and return success").
    pub async fn fetch(
        &self,
        session_id: i64,
        data: &[u8],
        base_name: &str,
    ) -> Result<Option<ArchiveManifest>, FetcherError> {
        let job_data = FetchJobData::from_bytes(data)?;
        let wanted: HashSet<&str> = job_data.call_ids.iter().map(String::as_str).collect();

        let all_recordings = self.provider.list_recordings(session_id).await?;
        let mut recordings = Vec::with_capacity(all_recordings.len());
        for recording in all_recordings {
            if wanted.contains(recording.call_id.as_str()) {
                recordings.push(recording);
            } else {
                warn!(session_id, call_id = %recording.call_id, "provider recording not in job call ids, skipping");
            }
        }

        if recordings.is_empty() {
            info!(session_id, "no archive");
            return Ok(None);
        }

        let mut streams = Vec::with_capacity(recordings.len());
        for recording in &recordings {
            streams.push(self.fetch_one(recording, base_name).await?);
        }

        Ok(Some(ArchiveManifest::new(streams)))
    }

    async fn fetch_one(
        &self,
        recording: &ProviderRecording,
        base_name: &str,
    ) -> Result<ArchiveStream, FetcherError> {
        let extension = match recording.kind {
            RecordingKind::Audio => "mp3",
            RecordingKind::Video => "flv",
        };
        let filename = format!("{base_name}-{}.{extension}", recording.call_id);

        let handle = self.storage.acquire().await?;
        if !handle.exists(&filename).await? {
            let bytes = self.provider.download_recording(&recording.call_id).await?;
            handle.save(&filename, bytes).await?;
        }

        let stream_type = match recording.kind {
            RecordingKind::Audio => ArchiveStreamType::UserAudio,
            RecordingKind::Video => ArchiveStreamType::UserVideo,
        };

        let mut stream = ArchiveStream::new(filename, stream_type)
            .with_offset_ms(recording.offset_ms.unwrap_or(0));
        if let Some(user_id) = recording.user_id {
            stream = stream.with_users([user_id]);
        }
        if let Some(length_ms) = recording.length_ms {
            stream = stream.with_length_ms(length_ms);
        }
        Ok(stream)
    }

    /// Removes every recording for `session_id` at the provider. Missing
    /// recordings are a success, not an error.
    pub async fn delete(&self, session_id: i64, data: &[u8]) -> Result<(), FetcherError> {
        let job_data = FetchJobData::from_bytes(data)?;
        for call_id in &job_data.call_ids {
            self.provider.delete_recording(call_id).await?;
        }
        info!(session_id, "deleted provider recordings");
        Ok(())
    }
}
