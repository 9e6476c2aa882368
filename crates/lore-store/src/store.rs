//! Resource and conversation persistence.
//!
//! Two tables with a stable column order:
//! `resources(id, name, description, content, created_at, tags)` and
//! `conversations(id, user_input, assistant_response, created_at)`.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use lore_core::{Conversation, LoreError, Resource, StoreConfig};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pool::ConnectionPool;

const RESOURCE_COLUMNS: &str = "id, name, description, content, created_at, tags";
const CONVERSATION_COLUMNS: &str = "id, user_input, assistant_response, created_at";

/// Row counts for the store.
///
/// # Examples
///
/// ```
/// use lore_store::ResourceStore;
///
/// let store = ResourceStore::in_memory().unwrap();
/// let stats = store.stats().unwrap();
/// assert_eq!(stats.total_resources, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Number of stored resources.
    pub total_resources: usize,
    /// Resources whose tags are absent or empty.
    pub untagged_resources: usize,
    /// Number of logged conversations.
    pub total_conversations: usize,
}

/// SQLite-backed store for resources and the conversation log.
///
/// Safe to share between threads; each call borrows one pooled connection
/// for its own duration.
///
/// # Examples
///
/// ```
/// use lore_store::ResourceStore;
///
/// let store = ResourceStore::in_memory().unwrap();
/// let id = store
///     .insert_resource("Rust Book", "Ownership rules...", None, Some("rust"))
///     .unwrap();
/// let resource = store.get_resource(id).unwrap().unwrap();
/// assert_eq!(resource.name, "Rust Book");
/// assert!(store.get_resource(id + 1).unwrap().is_none());
/// ```
pub struct ResourceStore {
    pool: ConnectionPool,
}

impl ResourceStore {
    /// Open or create a store at `path` with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use lore_store::ResourceStore;
    ///
    /// let store = ResourceStore::open(Path::new("lore.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, LoreError> {
        let config = StoreConfig {
            path: path.to_path_buf(),
            ..StoreConfig::default()
        };
        Self::open_with(&config)
    }

    /// Open or create a store described by `config`.
    ///
    /// Creates tables if they don't exist and adds the `tags` column to
    /// databases created before tags were tracked.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] if the database cannot be opened or
    /// migrated.
    pub fn open_with(config: &StoreConfig) -> Result<Self, LoreError> {
        let pool = ConnectionPool::open(
            &config.path,
            config.pool_size,
            Duration::from_millis(config.busy_timeout_ms),
            init_schema,
        )?;
        debug!(path = %config.path.display(), pool_size = pool.size(), "opened resource store");
        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] if schema creation fails.
    pub fn in_memory() -> Result<Self, LoreError> {
        let pool = ConnectionPool::in_memory(init_schema)?;
        Ok(Self { pool })
    }

    /// Insert a resource and return its id.
    ///
    /// Field contents are not validated beyond the schema's `NOT NULL`
    /// constraints.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on insert failure.
    pub fn insert_resource(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
        tags: Option<&str>,
    ) -> Result<i64, LoreError> {
        let now = timestamp_now();
        let id = self.pool.with_conn(|conn| {
            conn.execute(
                "INSERT INTO resources (name, description, content, created_at, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, description, content, now, tags],
            )
            .map_err(db_err("failed to insert resource"))?;
            Ok(conn.last_insert_rowid())
        })?;
        debug!(id, name, "inserted resource");
        Ok(id)
    }

    /// Look up a resource by id. Returns `Ok(None)` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn get_resource(&self, id: i64) -> Result<Option<Resource>, LoreError> {
        self.pool.with_conn(|conn| {
            let result = conn.query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
                params![id],
                resource_from_row,
            );

            match result {
                Ok(resource) => Ok(Some(resource)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(LoreError::Storage(format!(
                    "failed to get resource {id}: {e}"
                ))),
            }
        })
    }

    /// All resources in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn list_resources(&self) -> Result<Vec<Resource>, LoreError> {
        self.pool.with_conn(|conn| {
            query_resources(
                conn,
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY id"),
                [],
            )
        })
    }

    /// Replace a resource's tags. Last write wins.
    ///
    /// Updating an id that does not exist is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on update failure.
    pub fn update_tags(&self, id: i64, tags: &str) -> Result<(), LoreError> {
        let changed = self.pool.with_conn(|conn| {
            conn.execute(
                "UPDATE resources SET tags = ?1 WHERE id = ?2",
                params![tags, id],
            )
            .map_err(db_err("failed to update tags"))
        })?;
        debug!(id, tags, changed, "updated resource tags");
        Ok(())
    }

    /// Resources whose tags are `NULL` or the empty string, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn list_untagged(&self) -> Result<Vec<Resource>, LoreError> {
        self.pool.with_conn(|conn| {
            query_resources(
                conn,
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources
                     WHERE tags IS NULL OR tags = ''
                     ORDER BY id"
                ),
                [],
            )
        })
    }

    /// Resources whose name, description, content, or tags contain `query`
    /// as a literal, case-insensitive substring. An empty query matches
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn search_resources(&self, query: &str) -> Result<Vec<Resource>, LoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(query));

        self.pool.with_conn(|conn| {
            query_resources(
                conn,
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resources
                     WHERE name LIKE ?1 ESCAPE '\\'
                        OR description LIKE ?1 ESCAPE '\\'
                        OR content LIKE ?1 ESCAPE '\\'
                        OR tags LIKE ?1 ESCAPE '\\'
                     ORDER BY id"
                ),
                params![pattern],
            )
        })
    }

    /// Append an exchange to the conversation log and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on insert failure.
    pub fn add_conversation(
        &self,
        user_input: &str,
        assistant_response: &str,
    ) -> Result<i64, LoreError> {
        let now = timestamp_now();
        self.pool.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (user_input, assistant_response, created_at)
                 VALUES (?1, ?2, ?3)",
                params![user_input, assistant_response, now],
            )
            .map_err(db_err("failed to insert conversation"))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Look up a conversation by id. Returns `Ok(None)` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, LoreError> {
        self.pool.with_conn(|conn| {
            let result = conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                conversation_from_row,
            );

            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(LoreError::Storage(format!(
                    "failed to get conversation {id}: {e}"
                ))),
            }
        })
    }

    /// All conversations in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>, LoreError> {
        self.pool.with_conn(|conn| {
            query_conversations(
                conn,
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY id"),
                [],
            )
        })
    }

    /// The `n` most recent conversations, newest first.
    ///
    /// Ordering compares parsed times, so RFC 3339 rows and SQLite
    /// `CURRENT_TIMESTAMP` rows interleave correctly. Timestamp ties are
    /// broken by descending id.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn recent_conversations(&self, n: usize) -> Result<Vec<Conversation>, LoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        self.pool.with_conn(|conn| {
            query_conversations(
                conn,
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     ORDER BY julianday(created_at) DESC, id DESC
                     LIMIT ?1"
                ),
                params![limit],
            )
        })
    }

    /// Row counts across both tables.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Storage`] on query failure.
    pub fn stats(&self) -> Result<StoreStats, LoreError> {
        self.pool.with_conn(|conn| {
            let total_resources: i64 = conn
                .query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))
                .map_err(db_err("failed to count resources"))?;
            let untagged_resources: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM resources WHERE tags IS NULL OR tags = ''",
                    [],
                    |row| row.get(0),
                )
                .map_err(db_err("failed to count untagged resources"))?;
            let total_conversations: i64 = conn
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
                .map_err(db_err("failed to count conversations"))?;

            Ok(StoreStats {
                total_resources: total_resources as usize,
                untagged_resources: untagged_resources as usize,
                total_conversations: total_conversations as usize,
            })
        })
    }
}

fn init_schema(conn: &Connection) -> Result<(), LoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            content TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            tags TEXT
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_input TEXT NOT NULL,
            assistant_response TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        ",
    )
    .map_err(db_err("failed to create schema"))?;

    // Databases created before tags were tracked lack the column.
    if !has_column(conn, "resources", "tags")? {
        conn.execute_batch("ALTER TABLE resources ADD COLUMN tags TEXT;")
            .map_err(db_err("failed to add tags column"))?;
        debug!("added tags column to legacy resources table");
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, LoreError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(db_err("failed to inspect schema"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(db_err("failed to inspect schema"))?;

    for name in names {
        if name.map_err(db_err("failed to read schema row"))? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn query_resources<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Resource>, LoreError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(db_err("failed to prepare resource query"))?;
    let rows = stmt
        .query_map(params, resource_from_row)
        .map_err(db_err("failed to query resources"))?;

    let mut resources = Vec::new();
    for row in rows {
        resources.push(row.map_err(db_err("failed to read resource row"))?);
    }
    Ok(resources)
}

fn query_conversations<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Conversation>, LoreError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(db_err("failed to prepare conversation query"))?;
    let rows = stmt
        .query_map(params, conversation_from_row)
        .map_err(db_err("failed to query conversations"))?;

    let mut conversations = Vec::new();
    for row in rows {
        conversations.push(row.map_err(db_err("failed to read conversation row"))?);
    }
    Ok(conversations)
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        tags: row.get(5)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_input: row.get(1)?,
        assistant_response: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => Ok(parse_timestamp(&s).unwrap_or_else(|e| {
            warn!(raw = %s, error = %e, "unreadable timestamp, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        })),
        None => Ok(DateTime::<Utc>::UNIX_EPOCH),
    }
}

/// Parse RFC 3339 timestamps written by this store, falling back to
/// SQLite's text format (`YYYY-MM-DD HH:MM:SS` with optional fractional
/// seconds, UTC).
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc()),
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn db_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> LoreError {
    move |e| LoreError::Storage(format!("{context}: {e}"))
}
