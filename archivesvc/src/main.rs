use anyhow::Context;
use archive_config::{Config, StorageConfig};
use archive_db::{ArchiveStore, DbSession, JobStore};
use archive_fetcher::{Fetcher, ProviderClient};
use archive_persister::Persister;
use archive_service::{router, Archiver, ArchiverConfig, LogLayer, LogState};
use archive_stitcher::Stitcher;
use archive_storage::{Container, LocalBackend, S3Backend, StorageBackend, StoragePool, StoragePools};
use archive_waveform::WaveformGenerator;
use archive_worker::PipelineRunner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== Phase 1: logging ==========
    let log_state = LogState::new(2000);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(LogLayer::new(log_state.clone()))
        .init();

    // ========== Phase 2: configuration ==========
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(Path::new))
        .context("loading archivesvc configuration")?;

    // ========== Phase 3: storage, database, pipeline stages ==========
    let storage = build_storage_pools(&config.storage).await?;
    let db = Arc::new(DbSession::open(Path::new(&config.db.connection))?);

    let provider = ProviderClient::new(
        config.provider.credentials.base_url.clone(),
        config.provider.credentials.account.clone(),
        config.provider.credentials.auth_token.clone(),
    );
    let fetcher = Fetcher::new(provider, storage.get(Container::Work).clone());
    let stitcher = Stitcher::new(
        config.tools.ffmpeg_path.clone(),
        config.tools.sox_path.clone(),
        storage.get(Container::Work).clone(),
    );
    let waveform = WaveformGenerator::new(config.tools.ffmpeg_path.clone(), storage.get(Container::Work).clone());
    let persister = Persister::new(storage.clone(), ArchiveStore::new(db.clone()));
    let runner = Arc::new(PipelineRunner::new(
        fetcher,
        stitcher,
        waveform,
        persister,
        storage.work.clone(),
        config.archiver.timestamp_filenames,
    ));

    let store = Arc::new(JobStore::new(db));
    let archiver = Arc::new(Archiver::new(
        store,
        runner,
        ArchiverConfig {
            threads: config.archiver.threads,
            poll_seconds: config.archiver.poll_seconds,
            retry_seconds: config.archiver.retry_seconds as i64,
            queue_capacity: config.archiver.threads.max(1) * 4,
            worker_poll_timeout: Duration::from_secs(5),
        },
    ));

    // ========== Phase 4: start ==========
    archiver.start().await;
    info!("archivesvc is ready");

    let app = router(archiver.clone(), log_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", 8090)).await?;

    let server_task = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await
    });

    tokio::select! {
        _ = server_task => {}
        _ = signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    archiver.stop().await;
    if !archiver.join(JOIN_TIMEOUT).await {
        tracing::warn!("archiver did not drain within the shutdown timeout");
    }
    info!("archivesvc stopped");
    Ok(())
}

async fn build_storage_pools(config: &StorageConfig) -> anyhow::Result<StoragePools> {
    let work: Arc<dyn StorageBackend> = Arc::new(LocalBackend::new(config.local.location.as_str()));

    let public: Arc<dyn StorageBackend> = if config.public.container.starts_with("./") || config.public.container.starts_with('/') {
        Arc::new(LocalBackend::new(config.public.container.as_str()))
    } else {
        Arc::new(S3Backend::from_env(config.public.container.clone()).await)
    };
    let private: Arc<dyn StorageBackend> = if config.private.container.starts_with("./") || config.private.container.starts_with('/') {
        Arc::new(LocalBackend::new(config.private.container.as_str()))
    } else {
        Arc::new(S3Backend::from_env(config.private.container.clone()).await)
    };

    Ok(StoragePools {
        work: StoragePool::new(work, config.pool_size),
        public: StoragePool::new(public, config.pool_size),
        private: StoragePool::new(private, config.pool_size),
    })
}
