use archive_model::WaveformError;
use image::{Rgba, RgbaImage};
use std::path::Path;

const BACKGROUND: Rgba<u8> = Rgba([238, 238, 238, 255]);
const WAVEFORM: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Renders `data` (values already normalized to `[0, 1]`) as vertical
/// bars drawn from the vertical center, width = `data.len()`, height =
/// `height` pixels (spec §4.7 step 4).
pub fn render_png(data: &[f64], height: u32, path: &Path) -> Result<(), WaveformError> {
    let width = data.len() as u32;
    let mut image = RgbaImage::from_pixel(width.max(1), height, BACKGROUND);

    let peak = data.iter().cloned().fold(0.0_f64, f64::max);
    let scale = 1.0 - peak;
    let center = height as f64 / 2.0;

    for (x, value) in data.iter().enumerate() {
        let half_length = (value + scale) * center;
        let top = (center - half_length).max(0.0).round() as u32;
        let bottom = (center + half_length).min(height as f64).round() as u32;
        for y in top..=bottom.min(height.saturating_sub(1)) {
            image.put_pixel(x as u32, y, WAVEFORM);
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(WaveformError::Io)?;
    }
    image
        .save(path)
        .map_err(|e| WaveformError::RenderFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_expected_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wave.png");
        render_png(&[0.1, 0.9, 0.4], 280, &path).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 280);
    }
}
