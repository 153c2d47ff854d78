use crate::session::DbSession;
use archive_model::{ArchiveStream, PersisterError};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// Artifact metadata operations (spec §6 `ChatArchive`/`ChatArchiveUser`).
pub struct ArchiveStore {
    db: Arc<DbSession>,
}

impl ArchiveStore {
    pub fn new(db: Arc<DbSession>) -> Self {
        Self { db }
    }

    /// Persists every stream of one job's manifest in a single
    /// transaction: one `ChatArchive` row per stream plus its
    /// `ChatArchiveUser` rows. Fails the whole batch if any `path` is
    /// already present — spec §8 requires exactly one row per path.
    pub fn persist_streams(
        &self,
        session_id: i64,
        streams: &[ArchiveStream],
    ) -> Result<(), PersisterError> {
        let mut conn = self.db.conn.lock().expect("db mutex poisoned");
        let tx = conn
            .transaction()
            .map_err(|e| PersisterError::Database(e.to_string()))?;

        for stream in streams {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM chat_archive WHERE path = ?1",
                    params![stream.filename],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| PersisterError::Database(e.to_string()))?;
            if existing.is_some() {
                return Err(PersisterError::DuplicatePath(stream.filename.clone()));
            }

            let extension = stream
                .extension()
                .ok_or_else(|| PersisterError::UnknownMimeType(stream.filename.clone()))?;
            let mime_type_id: i64 = tx
                .query_row(
                    "SELECT id FROM mime_type WHERE extension = ?1",
                    params![extension],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| PersisterError::Database(e.to_string()))?
                .ok_or(PersisterError::UnknownMimeType(extension))?;

            let type_id: i64 = tx
                .query_row(
                    "SELECT id FROM chat_archive_type WHERE name = ?1",
                    params![stream.stream_type.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| PersisterError::Database(e.to_string()))?
                .ok_or_else(|| {
                    PersisterError::UnknownArchiveType(stream.stream_type.as_str().to_string())
                })?;

            tx.execute(
                "INSERT INTO chat_archive (session_id, type_id, path, mime_type_id, public, length, offset)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session_id,
                    type_id,
                    stream.filename,
                    mime_type_id,
                    stream.stream_type.is_public(),
                    stream.length_ms,
                    stream.offset_ms,
                ],
            )
            .map_err(|e| PersisterError::Database(e.to_string()))?;

            let chat_archive_id = tx.last_insert_rowid();
            for user_id in &stream.users {
                tx.execute(
                    "INSERT INTO chat_archive_user (user_id, chat_archive_id) VALUES (?1, ?2)",
                    params![user_id, chat_archive_id],
                )
                .map_err(|e| PersisterError::Database(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| PersisterError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn path_exists(&self, path: &str) -> Result<bool, PersisterError> {
        let conn = self.db.conn.lock().expect("db mutex poisoned");
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM chat_archive WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PersisterError::Database(e.to_string()))?;
        Ok(existing.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_model::ArchiveStreamType;

    #[test]
    fn persists_stream_and_user_rows() {
        let db = Arc::new(DbSession::open_in_memory().unwrap());
        let store = ArchiveStore::new(db);

        let stream = ArchiveStream::new("archive/2A-1.mp3", ArchiveStreamType::UserAudio)
            .with_users([11, 12])
            .with_offset_ms(2380)
            .with_length_ms(5000);

        store.persist_streams(42, &[stream]).unwrap();
        assert!(store.path_exists("archive/2A-1.mp3").unwrap());
    }

    #[test]
    fn rejects_duplicate_path() {
        let db = Arc::new(DbSession::open_in_memory().unwrap());
        let store = ArchiveStore::new(db);

        let stream = ArchiveStream::new("archive/2A.mp4", ArchiveStreamType::StitchedAudio);
        store.persist_streams(42, std::slice::from_ref(&stream)).unwrap();

        let err = store.persist_streams(42, &[stream]).unwrap_err();
        assert!(matches!(err, PersisterError::DuplicatePath(_)));
    }
}
