use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

/// A scoped handle around a single rusqlite connection, shared by the
/// job table and the artifact tables. sqlite serializes writers anyway;
/// the mutex just keeps that explicit instead of relying on the driver's
/// internal locking.
pub struct DbSession {
    pub(crate) conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id          INTEGER NOT NULL,
    owner               TEXT,
    created             INTEGER NOT NULL,
    not_before          INTEGER,
    start               INTEGER,
    end                 INTEGER,
    successful          INTEGER,
    retries_remaining   INTEGER NOT NULL,
    data                BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_jobs_eligible ON jobs (owner, start);

CREATE TABLE IF NOT EXISTS chat_archive_type (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS mime_type (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    extension   TEXT NOT NULL UNIQUE,
    mime        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_archive (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      INTEGER NOT NULL,
    type_id         INTEGER NOT NULL REFERENCES chat_archive_type (id),
    path            TEXT NOT NULL UNIQUE,
    mime_type_id    INTEGER NOT NULL REFERENCES mime_type (id),
    public          INTEGER NOT NULL,
    length          INTEGER,
    offset          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_archive_user (
    user_id             INTEGER NOT NULL,
    chat_archive_id     INTEGER NOT NULL REFERENCES chat_archive (id),
    PRIMARY KEY (user_id, chat_archive_id)
);
";

const DEFAULT_TYPES: &[&str] = &["USER_VIDEO", "USER_AUDIO", "STITCHED_AUDIO"];
const DEFAULT_MIME_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("wav", "audio/wav"),
    ("png", "image/png"),
];

impl DbSession {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Self::seed_lookup_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn seed_lookup_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
        for name in DEFAULT_TYPES {
            conn.execute(
                "INSERT OR IGNORE INTO chat_archive_type (name) VALUES (?1)",
                [name],
            )?;
        }
        for (ext, mime) in DEFAULT_MIME_TYPES {
            conn.execute(
                "INSERT OR IGNORE INTO mime_type (extension, mime) VALUES (?1, ?2)",
                [ext, mime],
            )?;
        }
        Ok(())
    }
}
