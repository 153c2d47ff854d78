use crate::paths::with_norm_suffix;
use crate::stats;
use crate::tool::run_tool;
use archive_model::{ArchiveStream, ArchiveStreamType, StitcherError};
use archive_storage::StoragePool;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

/// ffmpeg/sox orchestration (S, spec §4.6): audio extraction, RMS-pivot
/// normalization, mix+pad, and mp4 remux.
pub struct Stitcher {
    ffmpeg_path: String,
    sox_path: String,
    /// Scratch storage for streams whose home backend can't hand back a
    /// local path (spec's pre/post-stage download-and-rebind dance).
    work: StoragePool,
}

struct Measurement {
    rms: f64,
    volume_adjustment: f64,
}

impl Stitcher {
    pub fn new(ffmpeg_path: impl Into<String>, sox_path: impl Into<String>, work: StoragePool) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sox_path: sox_path.into(),
            work,
        }
    }

    /// Returns `[mp4_stream, stitched_mp3_stream]`.
    pub async fn stitch(
        &self,
        remote: &StoragePool,
        streams: &[ArchiveStream],
        base_name: &str,
    ) -> Result<[ArchiveStream; 2], StitcherError> {
        let first = streams
            .first()
            .ok_or_else(|| StitcherError::UnreadableInput(base_name.to_string()))?;

        let (pool, downloaded) = self.rebind_if_needed(remote, first, streams).await?;

        let mut audio_streams = Vec::with_capacity(streams.len());
        for (i, stream) in streams.iter().enumerate() {
            let output_filename = format!("{base_name}-{}.mp3", i + 1);
            self.extract_audio(pool, &stream.filename, &output_filename).await?;

            let mut extracted = ArchiveStream::new(output_filename, ArchiveStreamType::UserAudio)
                .with_users(stream.users.iter().copied())
                .with_offset_ms(stream.offset_ms);
            if let Some(length_ms) = stream.length_ms {
                extracted = extracted.with_length_ms(length_ms);
            }
            audio_streams.push(extracted);
        }

        let normalized = self.normalize(pool, &audio_streams).await?;
        let mp3_stream = self.mix(pool, &normalized, base_name).await?;

        let mp4_filename = format!("{base_name}.mp4");
        self.remux_to_mp4(pool, &mp3_stream.filename, &mp4_filename).await?;
        let mut mp4_stream = ArchiveStream::new(mp4_filename, ArchiveStreamType::StitchedAudio)
            .with_users(mp3_stream.users.iter().copied())
            .with_offset_ms(mp3_stream.offset_ms);
        if let Some(length_ms) = mp3_stream.length_ms {
            mp4_stream = mp4_stream.with_length_ms(length_ms);
        }

        if downloaded {
            self.upload_back(remote, &[&mp3_stream, &mp4_stream]).await?;
        }

        Ok([mp4_stream, mp3_stream])
    }

    /// Checks whether the first stream's filename resolves to a real
    /// path in `remote`; if not, downloads every stream into the work
    /// pool and operates out of there for the rest of the call.
    async fn rebind_if_needed<'a>(
        &'a self,
        remote: &'a StoragePool,
        first: &ArchiveStream,
        streams: &[ArchiveStream],
    ) -> Result<(&'a StoragePool, bool), StitcherError> {
        {
            let remote_handle = remote.acquire().await?;
            if remote_handle.local_path(&first.filename).is_some() {
                return Ok((remote, false));
            }
        }

        for stream in streams {
            let bytes = {
                let remote_handle = remote.acquire().await?;
                remote_handle.load(&stream.filename).await?
            };
            let work_handle = self.work.acquire().await?;
            if !work_handle.exists(&stream.filename).await? {
                work_handle.save(&stream.filename, bytes).await?;
            }
        }
        info!("stitcher rebound to local working directory");
        Ok((&self.work, true))
    }

    async fn extract_audio(
        &self,
        pool: &StoragePool,
        input: &str,
        output: &str,
    ) -> Result<(), StitcherError> {
        let (in_path, out_path) = {
            let handle = pool.acquire().await?;
            if handle.exists(output).await? {
                return Ok(());
            }
            (self.require_path(&handle, input)?, self.require_path(&handle, output)?)
        };
        ensure_parent(&out_path).await?;

        run_tool(
            &self.ffmpeg_path,
            &[
                "-y",
                "-i",
                &in_path.to_string_lossy(),
                "-vn",
                "-ar",
                "44100",
                &out_path.to_string_lossy(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Stage B: measures every stream's RMS, picks the quietest as the
    /// pivot, gives it `0.70 * max_safe_gain` headroom, then scales every
    /// other stream to match the pivot's post-gain RMS.
    async fn normalize(
        &self,
        pool: &StoragePool,
        audio_streams: &[ArchiveStream],
    ) -> Result<Vec<ArchiveStream>, StitcherError> {
        let mut measurements = Vec::with_capacity(audio_streams.len());
        for stream in audio_streams {
            measurements.push(self.measure(pool, &stream.filename).await?);
        }

        let pivot_index = measurements
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.rms.total_cmp(&b.1.rms))
            .map(|(i, _)| i)
            .expect("audio_streams is non-empty");

        let pivot = &audio_streams[pivot_index];
        let pivot_gain = 0.70 * measurements[pivot_index].volume_adjustment;
        let pivot_norm_filename = with_norm_suffix(&pivot.filename);
        self.apply_gain(pool, &pivot.filename, &pivot_norm_filename, pivot_gain).await?;

        let target_rms = self.measure(pool, &pivot_norm_filename).await?.rms;

        let mut normalized = Vec::with_capacity(audio_streams.len());
        for (i, stream) in audio_streams.iter().enumerate() {
            if i == pivot_index {
                normalized.push(rename(stream, pivot_norm_filename.clone()));
                continue;
            }
            let gain = target_rms / measurements[i].rms;
            let norm_filename = with_norm_suffix(&stream.filename);
            self.apply_gain(pool, &stream.filename, &norm_filename, gain).await?;
            normalized.push(rename(stream, norm_filename));
        }
        Ok(normalized)
    }

    async fn measure(&self, pool: &StoragePool, filename: &str) -> Result<Measurement, StitcherError> {
        let path = {
            let handle = pool.acquire().await?;
            self.require_path(&handle, filename)?
        };
        let output = run_tool(&self.sox_path, &[&path.to_string_lossy(), "-n", "stat"]).await?;
        let rms = stats::rms_amplitude(&output)
            .ok_or_else(|| StitcherError::NoVolumeMeasurement(filename.to_string()))?;
        let volume_adjustment = stats::volume_adjustment(&output)
            .ok_or_else(|| StitcherError::NoVolumeMeasurement(filename.to_string()))?;
        Ok(Measurement { rms, volume_adjustment })
    }

    async fn apply_gain(
        &self,
        pool: &StoragePool,
        input: &str,
        output: &str,
        gain: f64,
    ) -> Result<(), StitcherError> {
        let (in_path, out_path) = {
            let handle = pool.acquire().await?;
            if handle.exists(output).await? {
                return Ok(());
            }
            (self.require_path(&handle, input)?, self.require_path(&handle, output)?)
        };
        run_tool(
            &self.sox_path,
            &[&in_path.to_string_lossy(), &out_path.to_string_lossy(), "vol", &format!("{gain}")],
        )
        .await?;
        Ok(())
    }

    /// Stage C: single-stream inputs are re-normalized and padded in
    /// place; multi-stream inputs are mixed through sox's pipe-input
    /// syntax (`|sox <path> -p pad <seconds>`), one pipe per stream.
    async fn mix(
        &self,
        pool: &StoragePool,
        normalized: &[ArchiveStream],
        base_name: &str,
    ) -> Result<ArchiveStream, StitcherError> {
        let output_filename = format!("{base_name}.mp3");

        let already_mixed = {
            let handle = pool.acquire().await?;
            handle.exists(&output_filename).await?
        };
        if !already_mixed {
            let out_path = {
                let handle = pool.acquire().await?;
                self.require_path(&handle, &output_filename)?
            };
            ensure_parent(&out_path).await?;

            if normalized.len() > 1 {
                let mut args = vec!["-m".to_string(), "--norm".to_string()];
                for stream in normalized {
                    let path = {
                        let handle = pool.acquire().await?;
                        self.require_path(&handle, &stream.filename)?
                    };
                    let offset_seconds = stream.offset_ms as f64 / 1000.0;
                    args.push(format!("|sox {} -p pad {offset_seconds}", path.display()));
                }
                args.push(out_path.to_string_lossy().into_owned());
                let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
                run_tool(&self.sox_path, &arg_refs).await?;
            } else {
                let stream = &normalized[0];
                let in_path = {
                    let handle = pool.acquire().await?;
                    self.require_path(&handle, &stream.filename)?
                };
                let offset_seconds = format!("{:.3}", stream.offset_ms as f64 / 1000.0);
                run_tool(
                    &self.sox_path,
                    &["--norm", &in_path.to_string_lossy(), "pad", &offset_seconds, &out_path.to_string_lossy()],
                )
                .await?;
            }
        }

        let length_output = self.measure_length(pool, &output_filename).await?;
        let length_ms = (length_output * 1000.0).round() as i64;

        let users: BTreeSet<i64> = normalized.iter().flat_map(|s| s.users.iter().copied()).collect();
        let offset_ms = normalized.iter().map(|s| s.offset_ms).min().unwrap_or(0);

        Ok(ArchiveStream::new(output_filename, ArchiveStreamType::StitchedAudio)
            .with_users(users)
            .with_offset_ms(offset_ms)
            .with_length_ms(length_ms))
    }

    async fn measure_length(&self, pool: &StoragePool, filename: &str) -> Result<f64, StitcherError> {
        let path = {
            let handle = pool.acquire().await?;
            self.require_path(&handle, filename)?
        };
        let output = run_tool(&self.sox_path, &[&path.to_string_lossy(), "-n", "stat"]).await?;
        stats::length_seconds(&output).ok_or_else(|| StitcherError::NoVolumeMeasurement(filename.to_string()))
    }

    async fn remux_to_mp4(&self, pool: &StoragePool, input: &str, output: &str) -> Result<(), StitcherError> {
        let (in_path, out_path) = {
            let handle = pool.acquire().await?;
            if handle.exists(output).await? {
                return Ok(());
            }
            (self.require_path(&handle, input)?, self.require_path(&handle, output)?)
        };
        run_tool(&self.ffmpeg_path, &["-y", "-i", &in_path.to_string_lossy(), &out_path.to_string_lossy()]).await?;
        Ok(())
    }

    async fn upload_back(&self, remote: &StoragePool, streams: &[&ArchiveStream]) -> Result<(), StitcherError> {
        for stream in streams {
            let bytes = {
                let work_handle = self.work.acquire().await?;
                work_handle.load(&stream.filename).await?
            };
            let remote_handle = remote.acquire().await?;
            remote_handle.save(&stream.filename, bytes).await?;
        }
        Ok(())
    }

    fn require_path(
        &self,
        handle: &archive_storage::StorageHandle<'_>,
        filename: &str,
    ) -> Result<PathBuf, StitcherError> {
        handle
            .local_path(filename)
            .ok_or_else(|| StitcherError::UnreadableInput(filename.to_string()))
    }
}

fn rename(stream: &ArchiveStream, filename: String) -> ArchiveStream {
    let mut renamed = ArchiveStream::new(filename, stream.stream_type)
        .with_users(stream.users.iter().copied())
        .with_offset_ms(stream.offset_ms);
    if let Some(length_ms) = stream.length_ms {
        renamed = renamed.with_length_ms(length_ms);
    }
    renamed
}

async fn ensure_parent(path: &std::path::Path) -> Result<(), StitcherError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
