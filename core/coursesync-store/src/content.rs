//! Content records, metadata and taxonomy terms.

use crate::{
    ContentRecord, ContentStore, ContentUpdate, NewContent, StoreError, StoreResult, from_db_time,
    to_db_time,
};
use chrono::Utc;
use coursesync_types::{ContentKind, LocalId, Metadata, StableId, TaxonomyTerms};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use tracing::debug;

const RECORD_COLUMNS: &str = "id, kind, stable_id, origin_id, title, body, summary, slug, status, \
     ordering, parent_id, featured_media, created_at, modified_at, last_synced_at";

/// Column values as read from SQLite, before interpretation.
struct RawRecord {
    id: i64,
    kind: String,
    stable_id: Option<String>,
    origin_id: Option<i64>,
    title: String,
    body: String,
    summary: String,
    slug: String,
    status: String,
    ordering: i64,
    parent_id: Option<i64>,
    featured_media: Option<String>,
    created_at: String,
    modified_at: String,
    last_synced_at: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            stable_id: row.get(2)?,
            origin_id: row.get(3)?,
            title: row.get(4)?,
            body: row.get(5)?,
            summary: row.get(6)?,
            slug: row.get(7)?,
            status: row.get(8)?,
            ordering: row.get(9)?,
            parent_id: row.get(10)?,
            featured_media: row.get(11)?,
            created_at: row.get(12)?,
            modified_at: row.get(13)?,
            last_synced_at: row.get(14)?,
        })
    }

    fn into_record(self) -> StoreResult<ContentRecord> {
        let invalid = |e: coursesync_types::ValidationError| StoreError::InvalidData(e.to_string());
        Ok(ContentRecord {
            local_id: LocalId::new(self.id),
            kind: self.kind.parse().map_err(invalid)?,
            stable_id: self.stable_id.map(StableId::new).transpose().map_err(invalid)?,
            origin_id: self.origin_id,
            title: self.title,
            body: self.body,
            summary: self.summary,
            slug: self.slug,
            status: self.status.parse().map_err(invalid)?,
            ordering: self.ordering,
            parent_id: self.parent_id.map(LocalId::new),
            featured_media: self.featured_media,
            created_at: from_db_time(&self.created_at)?,
            modified_at: from_db_time(&self.modified_at)?,
            last_synced_at: self.last_synced_at.as_deref().map(from_db_time).transpose()?,
        })
    }
}

fn query_records(conn: &Connection, sql: &str, params: impl Params) -> StoreResult<Vec<ContentRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RawRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawRecord::into_record).collect()
}

fn query_record(conn: &Connection, sql: &str, params: impl Params) -> StoreResult<Option<ContentRecord>> {
    Ok(query_records(conn, sql, params)?.into_iter().next())
}

fn upsert_metadata(conn: &Connection, id: i64, meta: &Metadata) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO content_meta (content_id, meta_key, meta_value) VALUES (?1, ?2, ?3)
         ON CONFLICT(content_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value",
    )?;
    for (key, value) in meta {
        stmt.execute(params![id, key, serde_json::to_string(value)?])?;
    }
    Ok(())
}

fn replace_terms(conn: &Connection, id: i64, terms: &TaxonomyTerms) -> StoreResult<()> {
    for (taxonomy, slugs) in terms {
        conn.execute(
            "DELETE FROM content_terms WHERE content_id = ?1 AND taxonomy = ?2",
            params![id, taxonomy],
        )?;
        let mut position = 0i64;
        for slug in slugs {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO content_terms (content_id, taxonomy, term, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, taxonomy, slug, position],
            )?;
            position += inserted as i64;
        }
    }
    Ok(())
}

impl ContentStore {
    // ── Lookups ──────────────────────────────────────────────────

    pub fn get(&self, id: LocalId) -> StoreResult<Option<ContentRecord>> {
        let conn = self.conn()?;
        query_record(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM content WHERE id = ?1"),
            params![id.get()],
        )
    }

    /// Like [`ContentStore::get`], but a missing record is an error.
    pub fn require(&self, id: LocalId) -> StoreResult<ContentRecord> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("content {id}")))
    }

    /// Indexed lookup by stable id. Stable ids are unique across kinds.
    pub fn find_by_stable_id(&self, stable_id: &StableId) -> StoreResult<Option<ContentRecord>> {
        let conn = self.conn()?;
        query_record(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM content WHERE stable_id = ?1"),
            params![stable_id.as_str()],
        )
    }

    pub fn find_by_slug(&self, kind: ContentKind, slug: &str) -> StoreResult<Option<ContentRecord>> {
        let conn = self.conn()?;
        query_record(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM content WHERE kind = ?1 AND slug = ?2"),
            params![kind.path_segment(), slug],
        )
    }

    /// Finds a record whose stable id or origin id equals `key`, optionally
    /// restricted to one kind. A stable-id match wins over an origin-id match.
    pub fn find_by_origin_ref(
        &self,
        kind: Option<ContentKind>,
        key: &str,
    ) -> StoreResult<Option<ContentRecord>> {
        let conn = self.conn()?;
        query_record(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM content
                 WHERE (stable_id = ?1 OR CAST(origin_id AS TEXT) = ?1)
                   AND (?2 IS NULL OR kind = ?2)
                 ORDER BY CASE WHEN stable_id = ?1 THEN 0 ELSE 1 END, id
                 LIMIT 1"
            ),
            params![key, kind.map(ContentKind::path_segment)],
        )
    }

    /// Direct children of `parent` of one kind, in sibling order.
    pub fn children(
        &self,
        parent: LocalId,
        kind: ContentKind,
        published_only: bool,
    ) -> StoreResult<Vec<ContentRecord>> {
        let conn = self.conn()?;
        query_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM content
                 WHERE parent_id = ?1 AND kind = ?2 AND (?3 = 0 OR status = 'published')
                 ORDER BY ordering, id"
            ),
            params![parent.get(), kind.path_segment(), published_only],
        )
    }

    /// One page of records of a kind, newest first.
    pub fn list(
        &self,
        kind: ContentKind,
        published_only: bool,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ContentRecord>> {
        let conn = self.conn()?;
        query_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM content
                 WHERE kind = ?1 AND (?2 = 0 OR status = 'published')
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ),
            params![kind.path_segment(), published_only, limit as i64, offset as i64],
        )
    }

    pub fn count(&self, kind: ContentKind, published_only: bool) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM content WHERE kind = ?1 AND (?2 = 0 OR status = 'published')",
            params![kind.path_segment(), published_only],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Ids of every record of a kind, oldest first.
    pub fn ids_of_kind(&self, kind: ContentKind) -> StoreResult<Vec<LocalId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM content WHERE kind = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![kind.path_segment()], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(LocalId::new).collect())
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Creates a record with its metadata and terms in one transaction.
    pub fn insert(&self, new: &NewContent) -> StoreResult<ContentRecord> {
        let id = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let now = to_db_time(Utc::now());
            tx.execute(
                "INSERT INTO content (kind, stable_id, origin_id, title, body, summary, slug,
                    status, ordering, parent_id, featured_media, created_at, modified_at,
                    last_synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, ?13)",
                params![
                    new.kind.path_segment(),
                    new.stable_id.as_ref().map(StableId::as_str),
                    new.origin_id,
                    new.title,
                    new.body,
                    new.summary,
                    new.slug,
                    new.status.as_str(),
                    new.ordering,
                    new.parent_id.map(LocalId::get),
                    new.featured_media,
                    now,
                    new.synced_at.map(to_db_time),
                ],
            )
            .map_err(StoreError::from_write)?;
            let id = tx.last_insert_rowid();
            upsert_metadata(&tx, id, &new.metadata)?;
            replace_terms(&tx, id, &new.terms)?;
            tx.commit()?;
            LocalId::new(id)
        };
        debug!(%id, kind = %new.kind, slug = %new.slug, "content created");

        let record = self.require(id)?;
        self.hooks.notify(self, &record, true);
        Ok(record)
    }

    /// Overwrites an existing record of `kind` in one transaction. Records of
    /// any other kind are never touched.
    pub fn update(
        &self,
        kind: ContentKind,
        id: LocalId,
        update: &ContentUpdate,
    ) -> StoreResult<ContentRecord> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let changed = tx
                .execute(
                    "UPDATE content SET title = ?1, body = ?2, summary = ?3, slug = ?4,
                        ordering = ?5, stable_id = COALESCE(?6, stable_id),
                        origin_id = COALESCE(?7, origin_id),
                        featured_media = COALESCE(?8, featured_media), modified_at = ?9,
                        last_synced_at = COALESCE(?10, last_synced_at)
                     WHERE id = ?11 AND kind = ?12",
                    params![
                        update.title,
                        update.body,
                        update.summary,
                        update.slug,
                        update.ordering,
                        update.stable_id.as_ref().map(StableId::as_str),
                        update.origin_id,
                        update.featured_media,
                        to_db_time(Utc::now()),
                        update.synced_at.map(to_db_time),
                        id.get(),
                        kind.path_segment(),
                    ],
                )
                .map_err(StoreError::from_write)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("{} {id}", kind.label())));
            }
            upsert_metadata(&tx, id.get(), &update.metadata)?;
            replace_terms(&tx, id.get(), &update.terms)?;
            tx.commit()?;
        }
        debug!(%id, %kind, "content updated");

        let record = self.require(id)?;
        self.hooks.notify(self, &record, false);
        Ok(record)
    }

    pub fn set_parent(&self, id: LocalId, parent: Option<LocalId>) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE content SET parent_id = ?1 WHERE id = ?2",
            params![parent.map(LocalId::get), id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("content {id}")));
        }
        Ok(())
    }

    /// Stores `candidate` as the record's stable id unless one is already
    /// set, then returns whichever id the record ends up with.
    pub fn set_stable_id_if_absent(
        &self,
        id: LocalId,
        candidate: &StableId,
    ) -> StoreResult<StableId> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE content SET stable_id = ?1 WHERE id = ?2 AND stable_id IS NULL",
            params![candidate.as_str(), id.get()],
        )
        .map_err(StoreError::from_write)?;
        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT stable_id FROM content WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => Err(StoreError::NotFound(format!("content {id}"))),
            Some(None) => Err(StoreError::InvalidData(format!("content {id} has no stable id"))),
            Some(Some(raw)) => StableId::new(raw).map_err(|e| StoreError::InvalidData(e.to_string())),
        }
    }

    // ── Metadata & terms ─────────────────────────────────────────

    pub fn metadata(&self, id: LocalId) -> StoreResult<Metadata> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT meta_key, meta_value FROM content_meta WHERE content_id = ?1 ORDER BY meta_key",
        )?;
        let rows = stmt
            .query_map(params![id.get()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut meta = Metadata::new();
        for (key, raw) in rows {
            meta.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(meta)
    }

    /// Upserts the given keys. Keys not present in `meta` are left as is.
    pub fn set_metadata(&self, id: LocalId, meta: &Metadata) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        upsert_metadata(&tx, id.get(), meta).map_err(|e| match e {
            StoreError::Database(db) => StoreError::from_write(db),
            other => other,
        })?;
        tx.commit()?;
        Ok(())
    }

    pub fn terms(&self, id: LocalId) -> StoreResult<TaxonomyTerms> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT taxonomy, term FROM content_terms WHERE content_id = ?1
             ORDER BY taxonomy, position",
        )?;
        let rows = stmt
            .query_map(params![id.get()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut terms = TaxonomyTerms::new();
        for (taxonomy, term) in rows {
            terms.entry(taxonomy).or_default().push(term);
        }
        Ok(terms)
    }
}
