//! Disk-backed overflow store for `MemoryBoundedKeySet`.
//!
//! Keys live in a SQLite table inside a temporary file that belongs to one
//! key set. The store trades durability for speed (no journal, no fsync): a
//! crash loses the run, which is rerun from scratch anyway.
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::errors::KeySetError;

pub(crate) struct SpillStore {
    conn: Connection,
    file: NamedTempFile,
    len: u64,
}

impl SpillStore {
    /// Create an empty store in a fresh temporary file under `dir`
    /// (the system temp directory when `None`).
    pub fn create(dir: Option<&Path>) -> Result<Self, KeySetError> {
        let mut builder = Builder::new();
        builder.prefix("streamguard-keys-").suffix(".sqlite");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let conn = Connection::open(file.path())?;
        // journal_mode answers with the mode now in effect.
        let _mode: String = conn.query_row("PRAGMA journal_mode = OFF", [], |row| row.get(0))?;
        conn.execute_batch(
            "PRAGMA synchronous = OFF;
             PRAGMA temp_store = MEMORY;
             CREATE TABLE spilled_keys (
                 key BLOB PRIMARY KEY,
                 first_seen INTEGER NOT NULL
             ) WITHOUT ROWID;",
        )?;
        debug!(path = %file.path().display(), "created key spill store");

        Ok(Self { conn, file, len: 0 })
    }

    /// Insert a key that is not yet present. Returns `false` if it already was.
    pub fn insert(&mut self, key: &[u8], first_seen: u64) -> Result<bool, KeySetError> {
        let changed = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO spilled_keys (key, first_seen) VALUES (?1, ?2)")?
            .execute(params![key, first_seen as i64])?;
        self.len += changed as u64;
        Ok(changed == 1)
    }

    /// Row at which `key` was first seen, if present.
    pub fn get(&self, key: &[u8]) -> Result<Option<u64>, KeySetError> {
        let first_seen = self
            .conn
            .prepare_cached("SELECT first_seen FROM spilled_keys WHERE key = ?1")?
            .query_row(params![key], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(first_seen.map(|v| v as u64))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Close the connection and delete the backing file.
    pub fn close(self) -> Result<(), KeySetError> {
        let Self { conn, file, .. } = self;
        let path = file.path().to_path_buf();
        let closed = conn.close().map_err(|(_, e)| KeySetError::Store(e));
        // The file is removed even when the connection reported an error.
        file.close()?;
        debug!(path = %path.display(), "removed key spill store");
        closed
    }
}
