//! SQLite store (via rusqlite).
//!
//! Configuration: WAL mode, NORMAL synchronous, one database file per handle.
//! Iteration pages through rows by rowid, so a reader holds the connection
//! only while it fetches one page and the writer interleaves between pages.

use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use sochdb_loadgen::{Backend, BackendError, BackendHandle, Codec, ItemIter};
use tempfile::TempDir;

use super::handle_dir;

const DEFAULT_PAGE_SIZE: usize = 512;

#[derive(Debug, Clone)]
pub struct SqliteBackend {
    root: PathBuf,
    page_size: usize,
}

impl SqliteBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Rows fetched per page during iteration (minimum 1).
    pub fn with_page_size(mut self, rows: usize) -> Self {
        self.page_size = rows.max(1);
        self
    }
}

impl<T: Send + Sync + 'static> Backend<T> for SqliteBackend {
    type Handle = SqliteHandle<T>;

    fn name(&self) -> &str {
        "sqlite"
    }

    fn supports_iteration(&self) -> bool {
        true
    }

    fn create(&self, codec: Codec<T>) -> Result<Self::Handle, BackendError> {
        let dir = handle_dir(&self.root, "sqlite-")?;
        let path = dir.path().join("events.sqlite3");
        let conn = Connection::open(&path)
            .map_err(|e| BackendError::CreateFailed(format!("SQLite open: {}", e)))?;

        // Tune for throughput.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             CREATE TABLE IF NOT EXISTS events (
                 id      INTEGER PRIMARY KEY,
                 payload BLOB NOT NULL
             );",
        )
        .map_err(|e| BackendError::CreateFailed(format!("SQLite setup: {}", e)))?;

        Ok(SqliteHandle {
            codec,
            conn: Mutex::new(Some(conn)),
            page_size: self.page_size,
            _dir: dir,
        })
    }
}

pub struct SqliteHandle<T> {
    codec: Codec<T>,
    conn: Mutex<Option<Connection>>,
    page_size: usize,
    _dir: TempDir,
}

impl<T> SqliteHandle<T> {
    fn max_rowid(&self) -> Result<i64, BackendError> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| BackendError::ReadFailed("sqlite handle is closed".into()))?;
        conn.query_row("SELECT COALESCE(MAX(id), 0) FROM events", [], |row| row.get(0))
            .map_err(|e| BackendError::ReadFailed(format!("max rowid: {}", e)))
    }

    /// Rows with `after < id <= upper`, at most one page.
    fn fetch_page(&self, after: i64, upper: i64) -> Result<Vec<(i64, Vec<u8>)>, BackendError> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| BackendError::ReadFailed("sqlite handle is closed".into()))?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, payload FROM events WHERE id > ?1 AND id <= ?2 ORDER BY id LIMIT ?3",
            )
            .map_err(|e| BackendError::ReadFailed(format!("prepare page: {}", e)))?;
        let rows = stmt
            .query_map(params![after, upper, self.page_size as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| BackendError::ReadFailed(format!("query page: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::ReadFailed(format!("read page: {}", e)))
    }
}

impl<T: Send + Sync + 'static> BackendHandle<T> for SqliteHandle<T> {
    fn append(&self, item: &T) -> Result<(), BackendError> {
        let payload = self.codec.encode(item);
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| BackendError::WriteFailed("sqlite handle is closed".into()))?;
        let mut stmt = conn
            .prepare_cached("INSERT INTO events (payload) VALUES (?1)")
            .map_err(|e| BackendError::WriteFailed(format!("prepare insert: {}", e)))?;
        stmt.execute(params![payload])
            .map_err(|e| BackendError::WriteFailed(format!("insert: {}", e)))?;
        Ok(())
    }

    fn iterate_all(&self) -> Result<ItemIter<'_, T>, BackendError> {
        let upper = self.max_rowid()?;
        Ok(Box::new(RowPages {
            handle: self,
            after: 0,
            upper,
            page: VecDeque::new(),
            done: upper == 0,
        }))
    }

    fn close(&self) -> Result<(), BackendError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        // WAL checkpoint to consolidate.
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(|e| BackendError::CloseFailed(format!("checkpoint: {}", e)))?;
        conn.close()
            .map_err(|(_, e)| BackendError::CloseFailed(format!("SQLite close: {}", e)))
    }
}

struct RowPages<'a, T> {
    handle: &'a SqliteHandle<T>,
    after: i64,
    upper: i64,
    page: VecDeque<(i64, Vec<u8>)>,
    done: bool,
}

impl<T> Iterator for RowPages<'_, T> {
    type Item = Result<T, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() {
            if self.done {
                return None;
            }
            match self.handle.fetch_page(self.after, self.upper) {
                Ok(rows) if rows.is_empty() => {
                    self.done = true;
                    return None;
                }
                Ok(rows) => self.page.extend(rows),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let (id, payload) = self.page.pop_front()?;
        self.after = id;
        if id >= self.upper && self.page.is_empty() {
            self.done = true;
        }
        Some(self.handle.codec.decode(&payload).map_err(BackendError::from))
    }
}
