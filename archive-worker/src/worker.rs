use crate::runner::PipelineRunner;
use archive_db::JobStore;
use archive_model::QueueError;
use archive_queue::{now_ms, JobQueue, LeaseGuard};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Worker Pool (WP, spec §4.2): N long-lived workers, each running one job
/// to completion before accepting another. No inter-job ordering.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        threads: usize,
        queue: Arc<JobQueue>,
        store: Arc<JobStore>,
        runner: Arc<PipelineRunner>,
        retry_seconds: i64,
        poll_timeout: Duration,
    ) -> Self {
        let handles = (0..threads.max(1))
            .map(|i| {
                let owner = format!("archivesvc-worker-{i}");
                tokio::spawn(worker_loop(
                    owner,
                    queue.clone(),
                    store.clone(),
                    runner.clone(),
                    retry_seconds,
                    poll_timeout,
                ))
            })
            .collect();
        Self { handles }
    }

    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    owner: String,
    queue: Arc<JobQueue>,
    store: Arc<JobStore>,
    runner: Arc<PipelineRunner>,
    retry_seconds: i64,
    poll_timeout: Duration,
) {
    loop {
        let job = match queue.get(poll_timeout).await {
            Ok(job) => job,
            Err(QueueError::Empty) => continue,
            Err(QueueError::Stopped) => break,
            Err(e) => {
                error!(error = %e, "worker failed to pull from job queue");
                continue;
            }
        };

        let guard = match LeaseGuard::acquire(store.clone(), job, &owner, now_ms(), retry_seconds) {
            Ok(guard) => guard,
            Err(QueueError::AlreadyOwned) => {
                info!("job already claimed by another worker, discarding");
                continue;
            }
            Err(e) => {
                error!(error = %e, "failed to acquire lease guard");
                continue;
            }
        };

        let session_id = guard.job.session_id;
        let data = guard.job.data.clone();
        let result = runner.run(session_id, &data, epoch_seconds()).await;

        match result {
            Ok(()) => {
                if let Err(e) = guard.complete_success(now_ms()) {
                    error!(session_id, error = %e, "failed to record job success");
                }
            }
            Err(e) => {
                error!(session_id, error = %e, "pipeline run failed");
                match guard.complete_failure(now_ms()) {
                    Ok(true) => info!(session_id, "retry scheduled"),
                    Ok(false) => warn!(session_id, "retries exhausted, job abandoned"),
                    Err(e) => error!(session_id, error = %e, "failed to record job failure"),
                }
            }
        }
    }
}

fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}
