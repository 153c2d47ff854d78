use archive_db::JobStore;
use archive_model::{ArchiveJob, QueueError};
use std::sync::Arc;
use tracing::error;

/// A job row claimed by exactly one worker. The worker must call either
/// [`LeaseGuard::complete_success`] or [`LeaseGuard::complete_failure`]
/// exactly once; dropping an unfinished guard is a bug (a panicking
/// stage), logged loudly but not otherwise recoverable — spec §6 has no
/// mid-job cancellation contract.
pub struct LeaseGuard {
    pub job: ArchiveJob,
    store: Arc<JobStore>,
    retry_seconds: i64,
    finished: bool,
}

impl LeaseGuard {
    /// Attempts to claim `job` for `owner`. Returns
    /// [`QueueError::AlreadyOwned`] if another worker won the race.
    pub fn acquire(
        store: Arc<JobStore>,
        mut job: ArchiveJob,
        owner: &str,
        now_ms: i64,
        retry_seconds: i64,
    ) -> Result<Self, QueueError> {
        if !store.lease(job.job_id, owner, now_ms)? {
            return Err(QueueError::AlreadyOwned);
        }
        job.owner = Some(owner.to_string());
        job.start_epoch_ms = Some(now_ms);
        Ok(Self {
            job,
            store,
            retry_seconds,
            finished: false,
        })
    }

    pub fn complete_success(mut self, now_ms: i64) -> Result<(), QueueError> {
        self.store.mark_success(self.job.job_id, now_ms)?;
        self.finished = true;
        Ok(())
    }

    /// Returns whether a retry row was scheduled (false when
    /// `retries_remaining` had already hit zero).
    pub fn complete_failure(mut self, now_ms: i64) -> Result<bool, QueueError> {
        let scheduled = self
            .store
            .mark_failure(self.job.job_id, now_ms, self.retry_seconds)?;
        self.finished = true;
        Ok(scheduled)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.finished {
            error!(job_id = self.job.job_id, "lease guard dropped without a terminal outcome");
        }
    }
}
