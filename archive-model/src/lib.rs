//! Shared types for the chat archive pipeline: the job and stream data
//! model (spec §3), the error taxonomy each component raises (spec §7),
//! and the deterministic session-id encoding used to derive artifact
//! filenames (spec §4.4).

pub mod encode;
pub mod error;
pub mod job;
pub mod stream;

pub use encode::encode_session_id;
pub use error::{
    ConfigError, FetcherError, PersisterError, PipelineError, QueueError, StitcherError,
    StorageError, WaveformError,
};
pub use job::{ArchiveJob, LeasedJob};
pub use stream::{ArchiveManifest, ArchiveStream, ArchiveStreamType};
