use crate::session::DbSession;
use archive_model::{ArchiveJob, QueueError};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// Job-table operations (spec §6 `jobs`). The only cross-process mutual
/// exclusion mechanism is the conditional `UPDATE` in [`JobStore::lease`];
/// everything else here is plain CRUD.
pub struct JobStore {
    db: Arc<DbSession>,
}

impl JobStore {
    pub fn new(db: Arc<DbSession>) -> Self {
        Self { db }
    }

    /// Inserts a fresh, unleased job row and returns its id.
    pub fn put(&self, job: &ArchiveJob, now_ms: i64) -> Result<i64, QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT INTO jobs (session_id, owner, created, not_before, start, end, successful, retries_remaining, data)
             VALUES (?1, NULL, ?2, NULL, NULL, NULL, NULL, ?3, ?4)",
            params![job.session_id, now_ms, job.retries_remaining, job.data],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Rows with no owner, not yet started, and either no `not_before` or
    /// one that has already elapsed — the poller's eligibility predicate.
    pub fn poll_eligible(&self, limit: usize, now_ms: i64) -> Result<Vec<ArchiveJob>, QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, owner, created, not_before, start, end, successful, retries_remaining, data
                 FROM jobs
                 WHERE owner IS NULL AND start IS NULL
                   AND (not_before IS NULL OR not_before <= ?1)
                 ORDER BY created ASC
                 LIMIT ?2",
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![now_ms, limit as i64], row_to_job)
            .map_err(|e| QueueError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| QueueError::Database(e.to_string()))
    }

    /// Atomically claims a row for `owner`. Zero rows updated means
    /// another worker won the race; the caller should treat this as
    /// [`QueueError::AlreadyOwned`].
    pub fn lease(&self, job_id: i64, owner: &str, now_ms: i64) -> Result<bool, QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        let updated = conn
            .execute(
                "UPDATE jobs SET owner = ?1, start = ?2
                 WHERE id = ?3 AND owner IS NULL AND start IS NULL",
                params![owner, now_ms, job_id],
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(updated == 1)
    }

    pub fn mark_success(&self, job_id: i64, now_ms: i64) -> Result<(), QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "UPDATE jobs SET end = ?1, successful = 1 WHERE id = ?2",
            params![now_ms, job_id],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(())
    }

    /// Marks the current lease terminated and, iff `retries_remaining`
    /// was greater than zero before this call, inserts a fresh retry row
    /// scheduled `retry_seconds` from now with the count decremented.
    /// Exhausted jobs get no retry row — an operational alert signal.
    pub fn mark_failure(
        &self,
        job_id: i64,
        now_ms: i64,
        retry_seconds: i64,
    ) -> Result<bool, QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "UPDATE jobs SET end = ?1, successful = 0 WHERE id = ?2",
            params![now_ms, job_id],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;

        let job: ArchiveJob = conn
            .query_row(
                "SELECT id, session_id, owner, created, not_before, start, end, successful, retries_remaining, data
                 FROM jobs WHERE id = ?1",
                params![job_id],
                row_to_job,
            )
            .map_err(|e| QueueError::Database(e.to_string()))?;

        if job.retries_remaining == 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO jobs (session_id, owner, created, not_before, start, end, successful, retries_remaining, data)
             VALUES (?1, NULL, ?2, ?3, NULL, NULL, NULL, ?4, ?5)",
            params![
                job.session_id,
                now_ms,
                now_ms + retry_seconds * 1000,
                job.retries_remaining - 1,
                job.data
            ],
        )
        .map_err(|e| QueueError::Database(e.to_string()))?;
        Ok(true)
    }

    pub fn get(&self, job_id: i64) -> Result<Option<ArchiveJob>, QueueError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        conn.query_row(
            "SELECT id, session_id, owner, created, not_before, start, end, successful, retries_remaining, data
             FROM jobs WHERE id = ?1",
            params![job_id],
            row_to_job,
        )
        .optional()
        .map_err(|e| QueueError::Database(e.to_string()))
    }
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ArchiveJob> {
    Ok(ArchiveJob {
        job_id: row.get(0)?,
        session_id: row.get(1)?,
        owner: row.get(2)?,
        created_epoch_ms: row.get(3)?,
        not_before_epoch_ms: row.get(4)?,
        start_epoch_ms: row.get(5)?,
        end_epoch_ms: row.get(6)?,
        successful: row.get::<_, Option<i64>>(7)?.map(|v| v != 0),
        retries_remaining: row.get(8)?,
        data: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> JobStore {
        JobStore::new(Arc::new(DbSession::open_in_memory().unwrap()))
    }

    #[test]
    fn lease_is_conditional_and_single_winner() {
        let store = store();
        let id = store
            .put(&ArchiveJob::new_pending(42, 3, vec![]), 1_000)
            .unwrap();

        assert!(store.lease(id, "worker-a", 1_100).unwrap());
        assert!(!store.lease(id, "worker-b", 1_200).unwrap());
    }

    #[test]
    fn eligible_excludes_leased_and_future_retries() {
        let store = store();
        let ready = store
            .put(&ArchiveJob::new_pending(1, 3, vec![]), 1_000)
            .unwrap();
        let leased = store
            .put(&ArchiveJob::new_pending(2, 3, vec![]), 1_000)
            .unwrap();
        store.lease(leased, "someone", 1_050).unwrap();

        let eligible = store.poll_eligible(10, 2_000).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].job_id, ready);
    }

    #[test]
    fn exhausted_retries_create_no_retry_row() {
        let store = store();
        let id = store
            .put(&ArchiveJob::new_pending(1, 0, vec![]), 1_000)
            .unwrap();
        store.lease(id, "w", 1_050).unwrap();

        let scheduled = store.mark_failure(id, 2_000, 300).unwrap();
        assert!(!scheduled);
        assert_eq!(store.poll_eligible(10, 999_999_999).unwrap().len(), 0);
    }

    #[test]
    fn retry_row_carries_decremented_count_and_delay() {
        let store = store();
        let id = store
            .put(&ArchiveJob::new_pending(1, 2, vec![]), 1_000)
            .unwrap();
        store.lease(id, "w", 1_050).unwrap();

        let scheduled = store.mark_failure(id, 2_000, 300).unwrap();
        assert!(scheduled);

        let retry_row = store
            .poll_eligible(10, 2_000 + 300 * 1000)
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(retry_row.retries_remaining, 1);
        assert_eq!(retry_row.not_before_epoch_ms, Some(2_000 + 300 * 1000));
    }
}
