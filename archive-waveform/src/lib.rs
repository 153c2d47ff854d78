mod bucket;
mod render;
mod waveform;

pub use bucket::{bucket_max_abs, downmix_decimate};
pub use render::render_png;
pub use waveform::WaveformGenerator;
