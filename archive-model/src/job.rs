use serde::{Deserialize, Serialize};

/// A row in the `jobs` table (spec §3, §6). Lease fields are `None` until
/// a worker claims the row; `successful`/`end_time` are set once only, by
/// the pipeline runner on termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub job_id: i64,
    pub session_id: i64,
    pub owner: Option<String>,
    pub created_epoch_ms: i64,
    pub not_before_epoch_ms: Option<i64>,
    pub start_epoch_ms: Option<i64>,
    pub end_epoch_ms: Option<i64>,
    pub successful: Option<bool>,
    pub retries_remaining: u32,
    pub data: Vec<u8>,
}

impl ArchiveJob {
    /// A fresh, unleased row ready to be inserted via `put`.
    pub fn new_pending(session_id: i64, retries_remaining: u32, data: Vec<u8>) -> Self {
        Self {
            job_id: 0,
            session_id,
            owner: None,
            created_epoch_ms: 0,
            not_before_epoch_ms: None,
            start_epoch_ms: None,
            end_epoch_ms: None,
            successful: None,
            retries_remaining,
            data,
        }
    }
}

/// A job handed to a worker by the poller, before the lease guard has
/// atomically claimed its row. Entering the guard may still fail with
/// `AlreadyOwned` if another worker raced ahead.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub job: ArchiveJob,
}
