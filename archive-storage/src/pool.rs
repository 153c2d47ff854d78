use crate::backend::StorageBackend;
use archive_model::StorageError;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds concurrent access to a [`StorageBackend`] to `pool_size` handles
/// (spec §6 ST). Each component acquires a [`StorageHandle`] for the
/// duration of one operation and the permit is released when the handle
/// drops, so a panicking caller can never leak capacity.
///
/// `Clone` shares the same backend and semaphore rather than creating a
/// second pool — the Fetcher, Stitcher, Waveform Generator and Persister
/// all address the same working-directory container this way without
/// multiplying its configured concurrency bound.
#[derive(Clone)]
pub struct StoragePool {
    backend: Arc<dyn StorageBackend>,
    semaphore: Arc<Semaphore>,
}

impl StoragePool {
    pub fn new(backend: Arc<dyn StorageBackend>, pool_size: usize) -> Self {
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Waits for a free handle. Only fails if the pool has been closed
    /// (all senders dropped), which does not happen during normal
    /// operation.
    pub async fn acquire(&self) -> Result<StorageHandle<'_>, StorageError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| StorageError::PoolClosed)?;
        Ok(StorageHandle {
            backend: self.backend.clone(),
            _permit: permit,
        })
    }
}

/// A scoped, leased reference to the pool's backend. Dereferences to
/// `&dyn StorageBackend`; dropping it returns the permit to the pool.
pub struct StorageHandle<'a> {
    backend: Arc<dyn StorageBackend>,
    _permit: SemaphorePermit<'a>,
}

impl std::ops::Deref for StorageHandle<'_> {
    type Target = dyn StorageBackend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}
