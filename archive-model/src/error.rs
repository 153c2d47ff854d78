use thiserror::Error;

/// Errors raised by the Fetcher (F) while talking to the recording provider.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("recording missing for call id '{0}'")]
    MissingRecording(String),
    #[error("provider authorization failed: {0}")]
    Unauthorized(String),
    #[error("malformed provider manifest: {0}")]
    BadManifest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("opaque job data could not be parsed: {0}")]
    BadJobData(String),
}

/// Errors raised by the Stitcher (S) while normalizing, mixing, or
/// remuxing audio.
#[derive(Debug, Error)]
pub enum StitcherError {
    #[error("external tool '{tool}' exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },
    #[error("unreadable input stream '{0}'")]
    UnreadableInput(String),
    #[error("tool produced no usable volume-adjustment measurement for '{0}'")]
    NoVolumeMeasurement(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the Waveform Generator (W).
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("audio decode failed for '{0}': {1}")]
    DecodeFailed(String, String),
    #[error("image render failed: {0}")]
    RenderFailed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the Persister (P).
#[derive(Debug, Error)]
pub enum PersisterError {
    #[error("duplicate archive path '{0}'")]
    DuplicatePath(String),
    #[error("database error: {0}")]
    Database(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("unknown mime type for extension '{0}'")]
    UnknownMimeType(String),
    #[error("unknown archive type '{0}'")]
    UnknownArchiveType(String),
}

/// Errors raised by the bounded Storage Pool (ST).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("backend does not support local paths")]
    NotLocal,
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("pool exhausted or closed")]
    PoolClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Benign and terminal signals from the Job Queue (JQ).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("a second worker attempted to lease an already-owned job")]
    AlreadyOwned,
    #[error("no eligible job available within the timeout")]
    Empty,
    #[error("queue is shutting down")]
    Stopped,
    #[error("database error: {0}")]
    Database(String),
}

/// Startup-only configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fatal configuration error: {0}")]
    Fatal(String),
}

/// The union of stage errors a Pipeline Runner (R) can propagate.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetcher(#[from] FetcherError),
    #[error(transparent)]
    Stitcher(#[from] StitcherError),
    #[error(transparent)]
    Waveform(#[from] WaveformError),
    #[error(transparent)]
    Persister(#[from] PersisterError),
}
