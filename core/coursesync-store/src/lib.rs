//! SQLite-backed storage for a course sync node.
//!
//! One database file holds everything a node persists:
//! - `content`: records of every kind, with the stable id in a UNIQUE column
//! - `content_meta`: per-record configuration metadata (JSON values)
//! - `content_terms`: taxonomy term assignments
//! - `sync_log`: the append-only audit trail
//! - `client_registrations`: clients known to a master

mod audit;
mod content;
mod error;
mod hooks;
mod records;
mod registry;

pub use error::{StoreError, StoreResult};
pub use hooks::{ReplicationHooks, SaveObserver, SuppressionGuard};
pub use records::{ContentRecord, ContentUpdate, NewContent};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent store for content, audit log and client registry.
pub struct ContentStore {
    conn: Arc<Mutex<Connection>>,
    hooks: ReplicationHooks,
}

impl ContentStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening content store");
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            hooks: ReplicationHooks::default(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS content (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                stable_id TEXT UNIQUE,
                origin_id INTEGER,
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                slug TEXT NOT NULL,
                status TEXT NOT NULL,
                ordering INTEGER NOT NULL DEFAULT 0,
                parent_id INTEGER,
                featured_media TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                last_synced_at TEXT,
                UNIQUE(kind, slug)
            );

            CREATE INDEX IF NOT EXISTS idx_content_kind_created
                ON content(kind, created_at);
            CREATE INDEX IF NOT EXISTS idx_content_parent
                ON content(parent_id, kind);
            CREATE INDEX IF NOT EXISTS idx_content_origin
                ON content(origin_id);

            CREATE TABLE IF NOT EXISTS content_meta (
                content_id INTEGER NOT NULL REFERENCES content(id) ON DELETE CASCADE,
                meta_key TEXT NOT NULL,
                meta_value TEXT NOT NULL,
                UNIQUE(content_id, meta_key)
            );

            CREATE TABLE IF NOT EXISTS content_terms (
                content_id INTEGER NOT NULL REFERENCES content(id) ON DELETE CASCADE,
                taxonomy TEXT NOT NULL,
                term TEXT NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE(content_id, taxonomy, term)
            );

            CREATE TABLE IF NOT EXISTS sync_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                direction TEXT NOT NULL,
                content_kind TEXT,
                content_ref TEXT NOT NULL,
                outcome TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sync_log_created
                ON sync_log(created_at);

            CREATE TABLE IF NOT EXISTS client_registrations (
                endpoint_url TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                push_secret TEXT,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Save observers registered on this store.
    pub fn hooks(&self) -> &ReplicationHooks {
        &self.hooks
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

pub(crate) fn to_db_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp `{raw}`: {e}")))
}
