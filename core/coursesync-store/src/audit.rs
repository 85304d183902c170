//! The sync log: an append-only audit trail of sync outcomes.

use crate::{ContentStore, StoreError, StoreResult, from_db_time, to_db_time};
use chrono::{DateTime, Utc};
use coursesync_types::{ContentKind, SyncLogEntry};
use rusqlite::params;

impl ContentStore {
    pub fn append_log(&self, entry: &SyncLogEntry) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_log (direction, content_kind, content_ref, outcome, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.direction.as_str(),
                entry.content_kind.map(ContentKind::path_segment),
                entry.content_ref,
                entry.outcome.as_str(),
                entry.message,
                to_db_time(entry.timestamp),
            ],
        )?;
        Ok(())
    }

    /// The most recent entries, newest first.
    pub fn recent_logs(&self, limit: usize) -> StoreResult<Vec<SyncLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT direction, content_kind, content_ref, outcome, message, created_at
             FROM sync_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(direction, kind, content_ref, outcome, message, ts)| {
                Ok(SyncLogEntry {
                    direction: direction.parse().map_err(StoreError::InvalidData)?,
                    content_kind: kind
                        .map(|k| k.parse::<ContentKind>())
                        .transpose()
                        .map_err(|e| StoreError::InvalidData(e.to_string()))?,
                    content_ref,
                    outcome: outcome.parse().map_err(StoreError::InvalidData)?,
                    message,
                    timestamp: from_db_time(&ts)?,
                })
            })
            .collect()
    }

    pub fn log_count(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sync_log", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Deletes entries older than `cutoff`, returning how many were removed.
    pub fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sync_log WHERE created_at < ?1",
            params![to_db_time(cutoff)],
        )?;
        Ok(removed)
    }
}
