use archive_db::JobStore;
use archive_model::{ArchiveJob, QueueError};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::error;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// Durable job queue (JQ, spec §6): a poller copies eligible rows from
/// `jobs` into a bounded in-memory channel; workers call [`JobQueue::get`]
/// to pull from it. [`JobQueue::stop`] is cooperative — it unblocks `get`
/// but never preempts a worker mid-job.
pub struct JobQueue {
    rx: AsyncMutex<mpsc::Receiver<ArchiveJob>>,
    stop_tx: watch::Sender<bool>,
    stopped: Arc<AtomicBool>,
    poller: AsyncMutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn start(store: Arc<JobStore>, poll_seconds: u64, channel_capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stopped = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(poll_loop(
            store,
            tx,
            stop_rx,
            Duration::from_secs(poll_seconds),
            channel_capacity,
        ));

        Arc::new(Self {
            rx: AsyncMutex::new(rx),
            stop_tx,
            stopped,
            poller: AsyncMutex::new(Some(handle)),
        })
    }

    /// Waits up to `timeout` for a job. `Empty` on timeout, `Stopped`
    /// once the queue has been told to shut down and drained.
    pub async fn get(&self, timeout: Duration) -> Result<ArchiveJob, QueueError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(QueueError::Stopped);
        }
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(job)) => Ok(job),
            Ok(None) => {
                self.stopped.store(true, Ordering::SeqCst);
                Err(QueueError::Stopped)
            }
            Err(_) => Err(QueueError::Empty),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(&self) {
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn poll_loop(
    store: Arc<JobStore>,
    tx: mpsc::Sender<ArchiveJob>,
    mut stop_rx: watch::Receiver<bool>,
    poll_interval: Duration,
    batch_size: usize,
) {
    loop {
        if *stop_rx.borrow() {
            return;
        }

        match store.poll_eligible(batch_size, now_ms()) {
            Ok(jobs) => {
                for job in jobs {
                    tokio::select! {
                        biased;
                        _ = stop_rx.changed() => return,
                        result = tx.send(job) => {
                            if result.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) => error!(error = %e, "job queue poll failed"),
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => return,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_db::DbSession;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_an_eligible_job_within_one_poll() {
        let db = Arc::new(DbSession::open_in_memory().unwrap());
        let store = Arc::new(JobStore::new(db));
        store
            .put(&ArchiveJob::new_pending(1, 3, vec![]), now_ms())
            .unwrap();

        let queue = JobQueue::start(store, 1, 8);
        let job = queue.get(Duration::from_secs(3)).await.unwrap();
        assert_eq!(job.session_id, 1);
    }

    #[tokio::test]
    async fn get_times_out_when_empty() {
        let db = Arc::new(DbSession::open_in_memory().unwrap());
        let store = Arc::new(JobStore::new(db));
        let queue = JobQueue::start(store, 60, 8);

        let result = queue.get(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(QueueError::Empty)));
    }

    #[tokio::test]
    async fn stop_unblocks_get() {
        let db = Arc::new(DbSession::open_in_memory().unwrap());
        let store = Arc::new(JobStore::new(db));
        let queue = JobQueue::start(store, 60, 8);

        queue.stop();
        queue.join().await;
        let result = queue.get(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(QueueError::Stopped)));
    }
}
