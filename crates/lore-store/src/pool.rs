//! Small round-robin pool of SQLite connections.
//!
//! File-backed pools run in WAL mode so readers are not blocked by a writer;
//! lock contention between writers is absorbed by the busy timeout.
//! In-memory pools hold a single connection, since every in-memory
//! connection would otherwise see its own private database.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use lore_core::LoreError;
use rusqlite::Connection;

/// Upper bound on pooled connections.
pub const MAX_POOL_SIZE: usize = 8;

/// A fixed set of connections handed out one operation at a time.
pub struct ConnectionPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ConnectionPool {
    /// Open `size` connections (clamped to `1..=MAX_POOL_SIZE`) to the
    /// database at `path`, creating parent directories as needed.
    ///
    /// `init` runs once on the first connection before the rest are opened,
    /// so schema creation never races with other pooled connections.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] if a connection cannot be opened or
    /// configured, or if `init` fails.
    pub fn open<F>(
        path: &Path,
        size: usize,
        busy_timeout: Duration,
        init: F,
    ) -> Result<Self, LoreError>
    where
        F: FnOnce(&Connection) -> Result<(), LoreError>,
    {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LoreError::Storage(format!("failed to create database directory: {e}"))
                })?;
            }
        }

        let size = size.clamp(1, MAX_POOL_SIZE);
        let mut connections = Vec::with_capacity(size);

        let first = open_file_connection(path, busy_timeout)?;
        // journal_mode reports the resulting mode as a row.
        let _mode: String = first
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| LoreError::Storage(format!("failed to enable WAL: {e}")))?;
        init(&first)?;
        connections.push(Mutex::new(first));

        for _ in 1..size {
            connections.push(Mutex::new(open_file_connection(path, busy_timeout)?));
        }

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Open a single-connection in-memory pool (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] if the connection cannot be created or
    /// `init` fails.
    pub fn in_memory<F>(init: F) -> Result<Self, LoreError>
    where
        F: FnOnce(&Connection) -> Result<(), LoreError>,
    {
        let conn = Connection::open_in_memory().map_err(|e| {
            LoreError::Storage(format!("failed to create in-memory database: {e}"))
        })?;
        init(&conn)?;

        Ok(Self {
            connections: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    /// Run `f` with a connection from the pool (round-robin).
    ///
    /// The connection is held only for the duration of `f`.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or [`LoreError::Storage`] if the
    /// connection's lock was poisoned by a panic in another thread.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LoreError>
    where
        F: FnOnce(&Connection) -> Result<T, LoreError>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let guard = self.connections[idx]
            .lock()
            .map_err(|e| LoreError::Storage(format!("connection lock poisoned: {e}")))?;
        f(&guard)
    }

    /// Number of connections in the pool.
    pub fn size(&self) -> usize {
        self.connections.len()
    }
}

fn open_file_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, LoreError> {
    let conn = Connection::open(path)
        .map_err(|e| LoreError::Storage(format!("failed to open database: {e}")))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| LoreError::Storage(format!("failed to set busy timeout: {e}")))?;
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| LoreError::Storage(format!("failed to apply pragmas: {e}")))?;
    Ok(conn)
}
