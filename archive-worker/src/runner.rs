use archive_db::ArchiveStore;
use archive_fetcher::Fetcher;
use archive_model::{encode_session_id, ArchiveStream, ArchiveStreamType, PipelineError};
use archive_persister::Persister;
use archive_stitcher::Stitcher;
use archive_storage::StoragePool;
use archive_waveform::WaveformGenerator;
use tracing::info;

/// Pipeline Runner (R, spec §4.4): the strict sequential stage order
/// F -> S -> W -> P -> delete-remote for one job.
pub struct PipelineRunner {
    fetcher: Fetcher,
    stitcher: Stitcher,
    waveform: WaveformGenerator,
    persister: Persister,
    remote: StoragePool,
    timestamp_filenames: bool,
}

impl PipelineRunner {
    pub fn new(
        fetcher: Fetcher,
        stitcher: Stitcher,
        waveform: WaveformGenerator,
        persister: Persister,
        remote: StoragePool,
        timestamp_filenames: bool,
    ) -> Self {
        Self {
            fetcher,
            stitcher,
            waveform,
            persister,
            remote,
            timestamp_filenames,
        }
    }

    /// Runs one job to completion. `now_epoch_seconds` only matters when
    /// `timestamp_filenames` is set, to deduplicate archive paths across
    /// non-production replays of the same session.
    pub async fn run(
        &self,
        session_id: i64,
        data: &[u8],
        now_epoch_seconds: i64,
    ) -> Result<(), PipelineError> {
        let base_name = self.base_name(session_id, now_epoch_seconds);

        let manifest = self.fetcher.fetch(session_id, data, &base_name).await?;
        let manifest = match manifest {
            Some(m) if !m.is_empty() => m,
            _ => {
                info!(session_id, "no archive");
                return Ok(());
            }
        };

        let [mp4_stream, _mixed_mp3] = self
            .stitcher
            .stitch(&self.remote, &manifest.streams, &base_name)
            .await?;

        let primary = self.waveform.generate(&self.remote, &mp4_stream, &base_name).await?;

        let non_stitched: Vec<ArchiveStream> = manifest
            .streams
            .into_iter()
            .filter(|s| s.stream_type != ArchiveStreamType::StitchedAudio)
            .collect();

        let mut union = Vec::with_capacity(non_stitched.len() + 1);
        union.push(primary);
        union.extend(non_stitched);

        self.persister.persist(session_id, &union).await?;

        self.fetcher.delete(session_id, data).await?;
        info!(session_id, "pipeline run complete");
        Ok(())
    }

    fn base_name(&self, session_id: i64, now_epoch_seconds: i64) -> String {
        let encoded = encode_session_id(session_id);
        if self.timestamp_filenames {
            format!("archive/{encoded}-{now_epoch_seconds}")
        } else {
            format!("archive/{encoded}")
        }
    }
}
