use archive_db::{ArchiveStore, DbSession, JobStore};
use archive_fetcher::{Fetcher, ProviderClient};
use archive_model::ArchiveJob;
use archive_persister::Persister;
use archive_queue::now_ms;
use archive_service::{Archiver, ArchiverConfig};
use archive_stitcher::Stitcher;
use archive_storage::{Container, LocalBackend, StoragePool, StoragePools};
use archive_waveform::WaveformGenerator;
use archive_worker::PipelineRunner;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_tool_path(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn build_archiver(db: Arc<DbSession>, provider_base_url: &str) -> Archiver {
    let work_dir = tempfile::tempdir().unwrap();
    let public_dir = tempfile::tempdir().unwrap();
    let private_dir = tempfile::tempdir().unwrap();

    let work = StoragePool::new(Arc::new(LocalBackend::new(work_dir.path())), 4);
    let storage = StoragePools {
        work: work.clone(),
        public: StoragePool::new(Arc::new(LocalBackend::new(public_dir.path())), 4),
        private: StoragePool::new(Arc::new(LocalBackend::new(private_dir.path())), 4),
    };

    let provider = ProviderClient::new(provider_base_url, "acct", "token");
    let fetcher = Fetcher::new(provider, storage.get(Container::Work).clone());
    let stitcher = Stitcher::new(
        mock_tool_path("mock_ffmpeg.sh"),
        mock_tool_path("mock_sox.sh"),
        storage.get(Container::Work).clone(),
    );
    let waveform = WaveformGenerator::new(mock_tool_path("mock_ffmpeg.sh"), storage.get(Container::Work).clone());
    let persister = Persister::new(storage.clone(), ArchiveStore::new(db.clone()));
    let runner = Arc::new(PipelineRunner::new(fetcher, stitcher, waveform, persister, work, false));

    let store = Arc::new(JobStore::new(db));
    let config = ArchiverConfig {
        threads: 2,
        poll_seconds: 60,
        retry_seconds: 300,
        queue_capacity: 8,
        worker_poll_timeout: Duration::from_millis(50),
    };
    Archiver::new(store, runner, config)
}

#[tokio::test]
async fn start_is_idempotent_and_stop_drains_within_timeout() {
    let server = MockServer::start().await;
    let db = Arc::new(DbSession::open_in_memory().unwrap());
    let archiver = build_archiver(db, &server.uri());

    archiver.start().await;
    assert!(archiver.is_running());
    archiver.start().await;
    assert!(archiver.is_running());

    archiver.stop().await;
    assert!(!archiver.is_running());
    archiver.stop().await;

    assert!(archiver.join(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn join_without_a_prior_start_returns_immediately() {
    let server = MockServer::start().await;
    let db = Arc::new(DbSession::open_in_memory().unwrap());
    let archiver = build_archiver(db, &server.uri());
    assert!(archiver.join(Duration::from_millis(50)).await);
}

#[tokio::test]
async fn a_pending_job_is_picked_up_and_recorded_as_successful() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/7/recordings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "recordings": [] })))
        .mount(&server)
        .await;

    let db = Arc::new(DbSession::open_in_memory().unwrap());
    let store = JobStore::new(db.clone());
    store
        .put(&ArchiveJob::new_pending(7, 0, b"{\"call_ids\":[]}".to_vec()), now_ms())
        .unwrap();

    let archiver = build_archiver(db.clone(), &server.uri());
    archiver.start().await;

    let job_store = JobStore::new(db);
    let mut settled = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(job) = job_store.get(1).unwrap() {
            if job.successful.is_some() {
                settled = true;
                break;
            }
        }
    }
    assert!(settled, "job never completed");

    archiver.stop().await;
    archiver.join(Duration::from_secs(5)).await;
}
