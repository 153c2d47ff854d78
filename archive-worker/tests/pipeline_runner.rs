use archive_db::{ArchiveStore, DbSession};
use archive_fetcher::{Fetcher, ProviderClient};
use archive_persister::Persister;
use archive_stitcher::Stitcher;
use archive_storage::{Container, LocalBackend, StorageBackend, StoragePool, StoragePools};
use archive_waveform::WaveformGenerator;
use archive_worker::PipelineRunner;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
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

fn job_data(call_ids: &[&str]) -> Vec<u8> {
    serde_json::json!({ "call_ids": call_ids }).to_string().into_bytes()
}

#[tokio::test]
async fn two_participant_session_is_fetched_stitched_and_persisted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions/42/recordings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "recordings": [
                {"call_id": "c1", "kind": "audio", "user_id": 12, "length_ms": 5000, "offset_ms": 2380},
                {"call_id": "c2", "kind": "audio", "user_id": 11, "length_ms": 5000, "offset_ms": 10288},
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/c1/media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-a".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/c2/media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-b".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/recordings/c1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/recordings/c2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let public_dir = tempfile::tempdir().unwrap();
    let private_dir = tempfile::tempdir().unwrap();

    let work = StoragePool::new(Arc::new(LocalBackend::new(work_dir.path())), 4);
    let storage = StoragePools {
        work: work.clone(),
        public: StoragePool::new(Arc::new(LocalBackend::new(public_dir.path())), 4),
        private: StoragePool::new(Arc::new(LocalBackend::new(private_dir.path())), 4),
    };

    let provider = ProviderClient::new(server.uri(), "acct", "token");
    let fetcher = Fetcher::new(provider, storage.get(Container::Work).clone());

    let stitcher = Stitcher::new(
        mock_tool_path("mock_ffmpeg.sh"),
        mock_tool_path("mock_sox.sh"),
        storage.get(Container::Work).clone(),
    );
    let waveform = WaveformGenerator::new(mock_tool_path("mock_ffmpeg.sh"), storage.get(Container::Work).clone());

    let db = Arc::new(DbSession::open_in_memory().unwrap());
    let persister = Persister::new(storage.clone(), ArchiveStore::new(db.clone()));

    let runner = PipelineRunner::new(fetcher, stitcher, waveform, persister, work, false);

    runner.run(42, &job_data(&["c1", "c2"]), 0).await.unwrap();

    let archives = ArchiveStore::new(db);
    assert!(archives.path_exists("archive/2A.mp4").unwrap());
    assert!(archives.path_exists("archive/2A-c1.mp3").unwrap());
    assert!(archives.path_exists("archive/2A-c2.mp3").unwrap());

    let public = LocalBackend::new(public_dir.path());
    assert!(public.exists("archive/2A.mp4").await.unwrap());
}

#[tokio::test]
async fn empty_manifest_is_a_no_op_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/99/recordings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "recordings": [] })))
        .mount(&server)
        .await;

    let work_dir = tempfile::tempdir().unwrap();
    let public_dir = tempfile::tempdir().unwrap();
    let private_dir = tempfile::tempdir().unwrap();

    let work = StoragePool::new(Arc::new(LocalBackend::new(work_dir.path())), 4);
    let storage = StoragePools {
        work: work.clone(),
        public: StoragePool::new(Arc::new(LocalBackend::new(public_dir.path())), 4),
        private: StoragePool::new(Arc::new(LocalBackend::new(private_dir.path())), 4),
    };

    let provider = ProviderClient::new(server.uri(), "acct", "token");
    let fetcher = Fetcher::new(provider, storage.get(Container::Work).clone());
    let stitcher = Stitcher::new(
        mock_tool_path("mock_ffmpeg.sh"),
        mock_tool_path("mock_sox.sh"),
        storage.get(Container::Work).clone(),
    );
    let waveform = WaveformGenerator::new(mock_tool_path("mock_ffmpeg.sh"), storage.get(Container::Work).clone());

    let db = Arc::new(DbSession::open_in_memory().unwrap());
    let persister = Persister::new(storage.clone(), ArchiveStore::new(db.clone()));

    let runner = PipelineRunner::new(fetcher, stitcher, waveform, persister, work, false);
    runner.run(99, &job_data(&[]), 0).await.unwrap();

    let archives = ArchiveStore::new(db);
    assert!(!archives.path_exists("archive/63.mp4").unwrap());
}
