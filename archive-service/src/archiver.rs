use archive_db::JobStore;
use archive_queue::JobQueue;
use archive_worker::{PipelineRunner, WorkerPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Tunables the Archiver needs at `start` time (spec §6 `archiver.*`).
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub threads: usize,
    pub poll_seconds: u64,
    pub retry_seconds: i64,
    pub queue_capacity: usize,
    pub worker_poll_timeout: Duration,
}

struct Running {
    queue: Arc<JobQueue>,
    pool: WorkerPool,
}

/// Owns the lifecycle of the Job Queue and Worker Pool (spec §4.3).
/// `start`/`stop` are idempotent; `join` waits for both to wind down.
pub struct Archiver {
    store: Arc<JobStore>,
    runner: Arc<PipelineRunner>,
    config: ArchiverConfig,
    running: AtomicBool,
    state: Mutex<Option<Running>>,
}

impl Archiver {
    pub fn new(store: Arc<JobStore>, runner: Arc<PipelineRunner>, config: ArchiverConfig) -> Self {
        Self {
            store,
            runner,
            config,
            running: AtomicBool::new(false),
            state: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("archiver already running, start is a no-op");
            return;
        }

        let queue = JobQueue::start(self.store.clone(), self.config.poll_seconds, self.config.queue_capacity);
        let pool = WorkerPool::start(
            self.config.threads,
            queue.clone(),
            self.store.clone(),
            self.runner.clone(),
            self.config.retry_seconds,
            self.config.worker_poll_timeout,
        );

        *self.state.lock().await = Some(Running { queue, pool });
        info!(threads = self.config.threads, "archiver started");
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(running) = self.state.lock().await.as_ref() {
            running.queue.stop();
        }
        info!("archiver stop requested");
    }

    /// Waits for the job queue's poller and every worker to finish, up to
    /// `timeout`. Returns `false` if `timeout` elapsed first.
    pub async fn join(&self, timeout: Duration) -> bool {
        let Some(running) = self.state.lock().await.take() else {
            return true;
        };
        let joined = tokio::time::timeout(timeout, async {
            running.queue.join().await;
            running.pool.join().await;
        })
        .await;

        match joined {
            Ok(()) => true,
            Err(_) => {
                warn!("archiver join timed out before workers drained");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
