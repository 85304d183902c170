//! The sync engine: applies incoming items to the local store.
//!
//! For each item the engine resolves an existing local record (stable id
//! first, then slug within the kind), applies the conflict policy, and logs
//! the outcome. Writes happen inside a replication-suppression scope so save
//! observers never mistake replicated content for a local edit.
//!
//! A batch is applied through a [`BatchContext`]: items are synced in order,
//! then flat parent references that pointed forward are relinked, and finally
//! every course created or overwritten in the batch has its structure map
//! rebuilt against the batch's [`OriginMap`].

use crate::error::{SyncError, SyncResult};
use crate::metadata::safe_metadata;
use crate::protocol::{BatchSummary, ItemResult};
use crate::rebuild::{OriginMap, RebuildReport, rebuild_structure};
use chrono::Utc;
use coursesync_store::{ContentRecord, ContentStore, ContentUpdate, NewContent};
use coursesync_types::{
    BatchItem, ContentItem, ContentKind, LifecycleState, LocalId, RawBatchItem, StableId,
    SyncDirection, SyncLogEntry, SyncOutcome,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do when an incoming item already exists locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the local record untouched.
    #[default]
    Skip,
    /// Replace the local record's content with the incoming item.
    Overwrite,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!("unknown conflict policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Created,
    Overwritten,
    Skipped,
}

/// State carried across the items of one batch (or one pull run).
#[derive(Debug, Default)]
pub struct BatchContext {
    origin_map: OriginMap,
    pending_parents: Vec<(LocalId, StableId)>,
    courses: Vec<LocalId>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin_map(&self) -> &OriginMap {
        &self.origin_map
    }
}

/// Applies incoming content to a store.
pub struct SyncEngine {
    store: Arc<ContentStore>,
    policy: ConflictPolicy,
}

impl SyncEngine {
    pub fn new(store: Arc<ContentStore>, policy: ConflictPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Syncs one validated item on its own, without batch bookkeeping.
    pub fn sync_single_item(
        &self,
        kind: ContentKind,
        item: &ContentItem,
        direction: SyncDirection,
    ) -> ItemResult {
        self.sync_into(&mut BatchContext::new(), kind, item, direction)
    }

    /// Validates and applies a raw batch, then relinks parents and rebuilds
    /// course structures.
    pub fn receive_batch(&self, items: Vec<RawBatchItem>, direction: SyncDirection) -> BatchSummary {
        let mut ctx = BatchContext::new();
        let mut summary = BatchSummary::default();
        for raw in items {
            summary.record(self.receive_raw(&mut ctx, raw, direction));
        }
        self.finish(ctx, direction);
        debug!(
            synced = summary.synced,
            skipped = summary.skipped,
            errors = summary.errors,
            "batch applied"
        );
        summary
    }

    /// Validates one raw item and applies it within `ctx`. Invalid items are
    /// logged and reported as errors; nothing is written for them.
    pub fn receive_raw(
        &self,
        ctx: &mut BatchContext,
        raw: RawBatchItem,
        direction: SyncDirection,
    ) -> ItemResult {
        let hint = raw.stable_hint().unwrap_or_default();
        let kind_hint = raw.kind.parse::<ContentKind>().ok();
        match BatchItem::from_raw(raw) {
            Ok(batch) => self.sync_into(ctx, batch.kind, &batch.item, direction),
            Err(err) => {
                let message = format!("Invalid item: {err}");
                warn!(stable_id = %hint, %message, "rejecting item");
                self.log(SyncLogEntry::new(
                    direction,
                    kind_hint,
                    hint.clone(),
                    SyncOutcome::Error,
                    message.clone(),
                ));
                ItemResult::error(hint, message)
            }
        }
    }

    /// Applies one validated item within `ctx`.
    pub fn sync_into(
        &self,
        ctx: &mut BatchContext,
        kind: ContentKind,
        item: &ContentItem,
        direction: SyncDirection,
    ) -> ItemResult {
        let (result, applied) = match self.apply(ctx, kind, item) {
            Ok((applied, record)) => {
                ctx.origin_map.insert(item.stable_id.as_str(), record.local_id);
                if let Some(origin) = item.origin_id {
                    ctx.origin_map.insert(origin.to_string(), record.local_id);
                }
                let (status, verb) = match applied {
                    Applied::Created => (SyncOutcome::Success, "Created"),
                    Applied::Overwritten => (SyncOutcome::Success, "Updated"),
                    Applied::Skipped => (SyncOutcome::Skipped, "Skipped existing"),
                };
                let result = ItemResult {
                    status,
                    stable_id: item.stable_id.to_string(),
                    local_id: Some(record.local_id),
                    message: format!("{verb} {}: {}", kind.label(), item.title),
                };
                (result, Some((applied, record)))
            }
            Err(err) => {
                warn!(stable_id = %item.stable_id, %kind, error = %err, "item sync failed");
                (
                    ItemResult::error(
                        item.stable_id.as_str(),
                        format!("Failed to sync {} {}: {err}", kind.label(), item.title),
                    ),
                    None,
                )
            }
        };

        if let Some((applied, record)) = applied {
            if kind == ContentKind::Course && applied != Applied::Skipped {
                ctx.courses.push(record.local_id);
            }
        }

        self.log(SyncLogEntry::new(
            direction,
            Some(kind),
            result.stable_id.clone(),
            result.status,
            result.message.clone(),
        ));
        result
    }

    /// Relinks parents that could not be resolved when their child was
    /// written, then rebuilds the structure of every touched course.
    pub fn finish(&self, ctx: BatchContext, direction: SyncDirection) -> Vec<RebuildReport> {
        for (child, parent_ref) in &ctx.pending_parents {
            match self.resolve_parent(&ctx.origin_map, parent_ref) {
                Ok(Some(parent)) => {
                    if let Err(err) = self.store.set_parent(*child, Some(parent)) {
                        warn!(%child, error = %err, "failed to relink parent");
                    }
                }
                Ok(None) => debug!(%child, parent = %parent_ref, "parent not present locally"),
                Err(err) => warn!(%child, error = %err, "parent lookup failed"),
            }
        }

        let mut reports = Vec::with_capacity(ctx.courses.len());
        for course in &ctx.courses {
            match rebuild_structure(&self.store, *course, &ctx.origin_map) {
                Ok(report) => {
                    self.log(SyncLogEntry::new(
                        direction,
                        Some(ContentKind::Course),
                        course.to_string(),
                        SyncOutcome::Info,
                        format!(
                            "Rebuilt course structure: {} kept, {} remapped, {} dropped",
                            report.kept, report.remapped, report.dropped
                        ),
                    ));
                    reports.push(report);
                }
                Err(err) => {
                    warn!(%course, error = %err, "structure rebuild failed");
                    self.log(SyncLogEntry::new(
                        direction,
                        Some(ContentKind::Course),
                        course.to_string(),
                        SyncOutcome::Error,
                        format!("Failed to rebuild course structure: {err}"),
                    ));
                }
            }
        }
        reports
    }

    fn apply(
        &self,
        ctx: &mut BatchContext,
        kind: ContentKind,
        item: &ContentItem,
    ) -> SyncResult<(Applied, ContentRecord)> {
        let existing = match self.store.find_by_stable_id(&item.stable_id)? {
            Some(record) if record.kind != kind => {
                return Err(SyncError::ContentTypeMismatch {
                    expected: kind,
                    found: record.kind,
                });
            }
            Some(record) => Some(record),
            None => self.store.find_by_slug(kind, &item.slug)?,
        };

        if let (Some(record), ConflictPolicy::Skip) = (&existing, self.policy) {
            debug!(id = %record.local_id, %kind, "exists, skipping");
            return Ok((Applied::Skipped, record.clone()));
        }

        let parent = match &item.parent_ref {
            Some(parent_ref) => self.resolve_parent(&ctx.origin_map, parent_ref)?,
            None => None,
        };
        let metadata = safe_metadata(&item.config_metadata);
        let now = Utc::now();

        let _guard = self.store.hooks().suppress();
        let (applied, record) = match existing {
            Some(record) => {
                let update = ContentUpdate {
                    title: item.title.clone(),
                    body: item.body.clone(),
                    summary: item.summary.clone(),
                    slug: item.slug.clone(),
                    ordering: item.ordering_key,
                    stable_id: Some(item.stable_id.clone()),
                    origin_id: item.origin_id,
                    featured_media: item.featured_media_ref.clone(),
                    metadata,
                    terms: item.taxonomy_terms.clone(),
                    synced_at: Some(now),
                };
                let record = self.store.update(kind, record.local_id, &update)?;
                if parent.is_some() {
                    self.store.set_parent(record.local_id, parent)?;
                }
                (Applied::Overwritten, record)
            }
            None => {
                let new = NewContent {
                    kind,
                    title: item.title.clone(),
                    body: item.body.clone(),
                    summary: item.summary.clone(),
                    slug: item.slug.clone(),
                    status: LifecycleState::Published,
                    ordering: item.ordering_key,
                    parent_id: parent,
                    stable_id: Some(item.stable_id.clone()),
                    origin_id: item.origin_id,
                    featured_media: item.featured_media_ref.clone(),
                    metadata,
                    terms: item.taxonomy_terms.clone(),
                    synced_at: Some(now),
                };
                (Applied::Created, self.store.insert(&new)?)
            }
        };

        if let (Some(parent_ref), None) = (&item.parent_ref, parent) {
            ctx.pending_parents.push((record.local_id, parent_ref.clone()));
        }
        Ok((applied, record))
    }

    fn resolve_parent(&self, map: &OriginMap, parent_ref: &StableId) -> SyncResult<Option<LocalId>> {
        if let Some(local) = map.get(parent_ref.as_str()) {
            return Ok(Some(local));
        }
        Ok(self
            .store
            .find_by_origin_ref(None, parent_ref.as_str())?
            .map(|r| r.local_id))
    }

    fn log(&self, entry: SyncLogEntry) {
        if let Err(err) = self.store.append_log(&entry) {
            warn!(error = %err, "failed to write sync log entry");
        }
    }
}
