//! Content export (master side).
//!
//! [`Exporter::export_tree`] walks a course and flattens it into the order a
//! receiver needs: parents before children, every item carrying its stable id
//! and filtered metadata.
//!
//! Children are looked up in three ways, in order, moving on only when a way
//! yields nothing:
//! 1. the course structure map, published steps only
//! 2. the course structure map, any state
//! 3. the flat parent relation
//!
//! so unpublished or unstructured descendants are not silently dropped.

use crate::error::{SyncError, SyncResult};
use crate::identity::ensure_stable_id;
use crate::metadata::safe_metadata;
use crate::protocol::{ContentPage, PageRequest};
use chrono::SecondsFormat;
use coursesync_store::{ContentRecord, ContentStore};
use coursesync_types::{
    BatchItem, ContentItem, ContentKind, CourseStructure, LocalId, StableId, StepEntry,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds wire items from local records.
pub struct Exporter {
    store: Arc<ContentStore>,
}

/// Accumulates the flattened tree, skipping items already emitted.
struct TreeBatch {
    items: Vec<BatchItem>,
    emitted: HashSet<StableId>,
}

impl TreeBatch {
    fn push(&mut self, batch: BatchItem) -> bool {
        if !self.emitted.insert(batch.item.stable_id.clone()) {
            debug!(stable_id = %batch.item.stable_id, "skipping duplicate step");
            return false;
        }
        self.items.push(batch);
        true
    }
}

impl Exporter {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    /// Converts one record into its wire item, assigning a stable id if the
    /// record has none yet.
    pub fn to_item(&self, record: &ContentRecord) -> SyncResult<ContentItem> {
        let stable_id = ensure_stable_id(&self.store, record.local_id)?;
        let parent_ref = match record.parent_id {
            Some(parent) if self.store.get(parent)?.is_some() => {
                Some(ensure_stable_id(&self.store, parent)?)
            }
            _ => None,
        };

        Ok(ContentItem {
            stable_id,
            origin_id: Some(record.local_id.get()),
            title: record.title.clone(),
            body: record.body.clone(),
            summary: record.summary.clone(),
            slug: record.slug.clone(),
            lifecycle_state: record.status,
            ordering_key: record.ordering,
            parent_ref,
            created_at: Some(record.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            modified_at: Some(record.modified_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            taxonomy_terms: self.store.terms(record.local_id)?,
            config_metadata: safe_metadata(&self.store.metadata(record.local_id)?),
            featured_media_ref: record.featured_media.clone(),
        })
    }

    /// Exports a single record, checking that it is of the requested kind.
    pub fn export_item(&self, kind: ContentKind, id: LocalId) -> SyncResult<BatchItem> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| SyncError::NotFound(format!("{} {id}", kind.label())))?;
        if record.kind != kind {
            return Err(SyncError::ContentTypeMismatch {
                expected: kind,
                found: record.kind,
            });
        }
        Ok(BatchItem::new(kind, self.to_item(&record)?))
    }

    /// One page of published records of a kind, newest first.
    pub fn export_page(&self, kind: ContentKind, request: PageRequest) -> SyncResult<ContentPage> {
        let total = self.store.count(kind, true)?;
        let records = self
            .store
            .list(kind, true, request.per_page as usize, request.offset())?;
        let items = records
            .iter()
            .map(|record| self.to_item(record))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(ContentPage::new(items, total, request))
    }

    /// Flattens a course into: course, then per lesson (by ordering key) the
    /// lesson, its topics, its quizzes and their questions, then course-level
    /// quizzes and their questions. A quiz reachable from several places is
    /// emitted once.
    pub fn export_tree(&self, root: LocalId) -> SyncResult<Vec<BatchItem>> {
        let course = self.store.require(root)?;
        if course.kind != ContentKind::Course {
            return Err(SyncError::ContentTypeMismatch {
                expected: ContentKind::Course,
                found: course.kind,
            });
        }

        let structure = CourseStructure::from_metadata(&self.store.metadata(root)?)
            .filter(|s| !s.is_empty());
        let mut batch = TreeBatch {
            items: Vec::new(),
            emitted: HashSet::new(),
        };
        batch.push(BatchItem::new(ContentKind::Course, self.to_item(&course)?));

        let lesson_steps = structure.as_ref().map(|s| s.steps(ContentKind::Lesson));
        let mut lessons = self.children(&course, ContentKind::Lesson, lesson_steps)?;
        // Stable: equal ordering keys keep their structure position.
        lessons.sort_by_key(|(lesson, _)| lesson.ordering);
        for (lesson, entry) in lessons {
            batch.push(BatchItem::new(ContentKind::Lesson, self.to_item(&lesson)?));

            let topic_steps = entry.map(|e| e.children_of(ContentKind::Topic));
            for (topic, _) in self.children(&lesson, ContentKind::Topic, topic_steps)? {
                batch.push(BatchItem::new(ContentKind::Topic, self.to_item(&topic)?));
            }

            let quiz_steps = entry.map(|e| e.children_of(ContentKind::Quiz));
            for (quiz, _) in self.children(&lesson, ContentKind::Quiz, quiz_steps)? {
                self.push_quiz(&mut batch, &quiz)?;
            }
        }

        let quiz_steps = structure.as_ref().map(|s| s.steps(ContentKind::Quiz));
        for (quiz, _) in self.children(&course, ContentKind::Quiz, quiz_steps)? {
            self.push_quiz(&mut batch, &quiz)?;
        }

        info!(course = %root, items = batch.items.len(), "exported course tree");
        Ok(batch.items)
    }

    fn push_quiz(&self, batch: &mut TreeBatch, quiz: &ContentRecord) -> SyncResult<()> {
        if !batch.push(BatchItem::new(ContentKind::Quiz, self.to_item(quiz)?)) {
            return Ok(());
        }
        for (question, _) in self.children(quiz, ContentKind::Question, None)? {
            batch.push(BatchItem::new(ContentKind::Question, self.to_item(&question)?));
        }
        Ok(())
    }

    /// Resolves the children of `parent` of one kind, trying the structured
    /// steps (published, then any state) before the flat parent relation.
    fn children<'s>(
        &self,
        parent: &ContentRecord,
        kind: ContentKind,
        steps: Option<&'s [StepEntry]>,
    ) -> SyncResult<Vec<(ContentRecord, Option<&'s StepEntry>)>> {
        if let Some(steps) = steps.filter(|s| !s.is_empty()) {
            let resolved = self.resolve_steps(steps, kind)?;
            let published: Vec<_> = resolved
                .iter()
                .filter(|(record, _)| record.is_published())
                .cloned()
                .collect();
            if !published.is_empty() {
                return Ok(published);
            }
            if !resolved.is_empty() {
                debug!(parent = %parent.local_id, %kind, "using unpublished structured steps");
                return Ok(resolved);
            }
        }

        let mut flat = self.store.children(parent.local_id, kind, true)?;
        if flat.is_empty() {
            flat = self.store.children(parent.local_id, kind, false)?;
        }
        Ok(flat.into_iter().map(|record| (record, None)).collect())
    }

    fn resolve_steps<'s>(
        &self,
        steps: &'s [StepEntry],
        kind: ContentKind,
    ) -> SyncResult<Vec<(ContentRecord, Option<&'s StepEntry>)>> {
        let mut out = Vec::with_capacity(steps.len());
        for entry in steps {
            let key = entry.key.id_part();
            let by_local = match key.parse::<i64>() {
                Ok(n) => self.store.get(LocalId::new(n))?.filter(|r| r.kind == kind),
                Err(_) => None,
            };
            let record = match by_local {
                Some(record) => Some(record),
                None => self.store.find_by_origin_ref(Some(kind), key)?,
            };
            match record {
                Some(record) => out.push((record, Some(entry))),
                None => debug!(%kind, key, "structure step does not resolve"),
            }
        }
        Ok(out)
    }
}
