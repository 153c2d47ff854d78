use crate::bucket::{bucket_max_abs, downmix_decimate};
use crate::render::render_png;
use archive_model::{ArchiveStream, WaveformError};
use archive_storage::StoragePool;
use tokio::process::Command;
use tracing::info;

const BUCKET_COUNT: usize = 1800;
const IMAGE_HEIGHT: u32 = 280;

/// Waveform Generator (W, spec §4.7): produces a `.wav` extraction, a
/// bucketed amplitude vector, and a PNG rendering of it. Requires local
/// filesystem paths for both ffmpeg and the wav reader, so — like the
/// Stitcher — it downloads to a working directory and rebinds there
/// when the stream's home pool can't hand back a path.
pub struct WaveformGenerator {
    ffmpeg_path: String,
    work: StoragePool,
}

impl WaveformGenerator {
    pub fn new(ffmpeg_path: impl Into<String>, work: StoragePool) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            work,
        }
    }

    /// Attaches `waveform_data` (a JSON array, 4-decimal precision) and
    /// `waveform_filename` to `stream`, leaving everything else
    /// unchanged.
    pub async fn generate(
        &self,
        remote: &StoragePool,
        stream: &ArchiveStream,
        base_name: &str,
    ) -> Result<ArchiveStream, WaveformError> {
        let (pool, downloaded) = self.rebind_if_needed(remote, stream).await?;

        let wav_filename = format!("{base_name}.wav");
        self.extract_wav(pool, &stream.filename, &wav_filename).await?;

        let wav_path = {
            let handle = pool.acquire().await?;
            handle
                .local_path(&wav_filename)
                .ok_or_else(|| WaveformError::DecodeFailed(wav_filename.clone(), "not locally accessible".into()))?
        };

        let (samples, channels) = read_wav(&wav_path)?;
        let decimated = downmix_decimate(&samples, channels);
        let buckets = bucket_max_abs(&decimated, channels, BUCKET_COUNT);

        let png_filename = format!("{base_name}.png");
        let png_path = {
            let handle = pool.acquire().await?;
            handle
                .local_path(&png_filename)
                .ok_or_else(|| WaveformError::RenderFailed("png destination not locally accessible".into()))?
        };
        render_png(&buckets, IMAGE_HEIGHT, &png_path)?;

        if downloaded {
            let bytes = std::fs::read(&png_path).map_err(WaveformError::Io)?;
            let remote_handle = remote.acquire().await?;
            remote_handle.save(&png_filename, bytes).await?;
        }

        let mut result = stream.clone();
        result.waveform_data = Some(encode_waveform_json(&buckets));
        result.waveform_filename = Some(png_filename);
        Ok(result)
    }

    async fn rebind_if_needed<'a>(
        &'a self,
        remote: &'a StoragePool,
        stream: &ArchiveStream,
    ) -> Result<(&'a StoragePool, bool), WaveformError> {
        {
            let remote_handle = remote.acquire().await?;
            if remote_handle.local_path(&stream.filename).is_some() {
                return Ok((remote, false));
            }
        }

        let bytes = {
            let remote_handle = remote.acquire().await?;
            remote_handle.load(&stream.filename).await?
        };
        let work_handle = self.work.acquire().await?;
        if !work_handle.exists(&stream.filename).await? {
            work_handle.save(&stream.filename, bytes).await?;
        }
        Ok((&self.work, true))
    }

    async fn extract_wav(&self, pool: &StoragePool, input: &str, output: &str) -> Result<(), WaveformError> {
        let (in_path, out_path) = {
            let handle = pool.acquire().await?;
            if handle.exists(output).await? {
                return Ok(());
            }
            let in_path = handle
                .local_path(input)
                .ok_or_else(|| WaveformError::DecodeFailed(input.to_string(), "not locally accessible".into()))?;
            let out_path = handle
                .local_path(output)
                .ok_or_else(|| WaveformError::DecodeFailed(output.to_string(), "not locally accessible".into()))?;
            (in_path, out_path)
        };
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(input, "extracting wav for waveform generation");
        let status = Command::new(&self.ffmpeg_path)
            .args(["-y", "-i"])
            .arg(&in_path)
            .args(["-vn", "-ar", "44100"])
            .arg(&out_path)
            .status()
            .await?;

        if !status.success() {
            return Err(WaveformError::DecodeFailed(
                input.to_string(),
                format!("ffmpeg exited with {status}"),
            ));
        }
        Ok(())
    }
}

fn read_wav(path: &std::path::Path) -> Result<(Vec<f64>, u16), WaveformError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| WaveformError::DecodeFailed(path.display().to_string(), e.to_string()))?;
    let spec = reader.spec();

    let samples: Result<Vec<f64>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().map(|s| s.map(|v| v as f64)).collect(),
        hound::SampleFormat::Int => {
            let max_amplitude = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_amplitude))
                .collect()
        }
    };
    let samples = samples.map_err(|e| WaveformError::DecodeFailed(path.display().to_string(), e.to_string()))?;
    Ok((samples, spec.channels))
}

/// `float("%.4f" % n)` equivalent: fixed 4-decimal formatting, emitted as
/// JSON numbers rather than strings.
fn encode_waveform_json(data: &[f64]) -> String {
    let mut out = String::from("[");
    for (i, value) in data.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{value:.4}"));
    }
    out.push(']');
    out
}
