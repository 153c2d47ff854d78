//! The Fetcher (F, spec §4.5): downloads per-participant recordings from
//! the third-party provider and deletes them once persisted.

pub mod fetcher;
pub mod provider;

pub use fetcher::{FetchJobData, Fetcher};
pub use provider::{ProviderClient, ProviderRecording, RecordingKind};
