//! Course structure rebuilding (receiver side).
//!
//! A course arrives with a structure map keyed by the origin's identifiers.
//! After the batch is committed every key is translated to the local id of
//! the matching record, or dropped when no such record exists.

use crate::error::SyncResult;
use coursesync_store::ContentStore;
use coursesync_types::{ContentKind, CourseStructure, LocalId, Metadata, StepEntry, StepSections};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, info};

/// Origin identifier (stable id or origin numeric id) → local id, built up
/// while a batch is applied.
#[derive(Debug, Clone, Default)]
pub struct OriginMap {
    entries: HashMap<String, LocalId>,
}

impl OriginMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, local: LocalId) {
        self.entries.insert(key.into(), local);
    }

    pub fn get(&self, key: &str) -> Option<LocalId> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What happened to the keys of one course's structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub course: Option<LocalId>,
    /// Keys that already named the right local record.
    pub kept: usize,
    /// Keys rewritten to a local id.
    pub remapped: usize,
    /// Keys (including nested ones) that resolved to nothing.
    pub dropped: usize,
}

struct Rebuilder<'a> {
    store: &'a ContentStore,
    map: &'a OriginMap,
    report: RebuildReport,
}

impl Rebuilder<'_> {
    fn resolve(&self, kind: ContentKind, key: &str) -> SyncResult<Option<LocalId>> {
        if let Some(local) = self.map.get(key) {
            if self.store.get(local)?.is_some_and(|r| r.kind == kind) {
                return Ok(Some(local));
            }
        }
        Ok(self
            .store
            .find_by_origin_ref(Some(kind), key)?
            .map(|r| r.local_id))
    }

    fn sections(&mut self, sections: StepSections) -> SyncResult<StepSections> {
        let mut out = StepSections::new();
        for (kind, entries) in sections {
            let mut kept_entries = Vec::with_capacity(entries.len());
            for entry in entries {
                if let Some(entry) = self.entry(kind, entry)? {
                    kept_entries.push(entry);
                }
            }
            if !kept_entries.is_empty() {
                out.insert(kind, kept_entries);
            }
        }
        Ok(out)
    }

    fn entry(&mut self, kind: ContentKind, entry: StepEntry) -> SyncResult<Option<StepEntry>> {
        let id_part = entry.key.id_part().to_string();
        let Some(local) = self.resolve(kind, &id_part)? else {
            let nested = count_keys(&entry.children);
            debug!(%kind, key = %entry.key, nested, "dropping unresolved step");
            self.report.dropped += 1 + nested;
            return Ok(None);
        };

        if local.to_string() == id_part {
            self.report.kept += 1;
        } else {
            self.report.remapped += 1;
        }
        Ok(Some(StepEntry {
            key: entry.key.with_id(local),
            children: self.sections(entry.children)?,
        }))
    }
}

fn count_keys(sections: &StepSections) -> usize {
    sections
        .values()
        .flatten()
        .map(|entry| 1 + count_keys(&entry.children))
        .sum()
}

fn id_list(ids: Vec<String>) -> Value {
    Value::Array(
        ids.into_iter()
            .map(|id| id.parse::<i64>().map_or_else(|_| json!(id), |n| json!(n)))
            .collect(),
    )
}

/// Rewrites a course's structure map so every key names a local record, then
/// regenerates the derived lesson and quiz id lists.
pub fn rebuild_structure(
    store: &ContentStore,
    course: LocalId,
    map: &OriginMap,
) -> SyncResult<RebuildReport> {
    let meta = store.metadata(course)?;
    let Some(structure) = CourseStructure::from_metadata(&meta) else {
        debug!(%course, "course has no structure map");
        return Ok(RebuildReport {
            course: Some(course),
            ..RebuildReport::default()
        });
    };

    let mut rebuilder = Rebuilder {
        store,
        map,
        report: RebuildReport {
            course: Some(course),
            ..RebuildReport::default()
        },
    };
    let rebuilt = CourseStructure::from_sections(rebuilder.sections(structure.into_sections())?);

    let mut update = Metadata::new();
    update.insert(CourseStructure::LESSON_IDS_KEY.into(), id_list(rebuilt.lesson_ids()));
    update.insert(CourseStructure::QUIZ_IDS_KEY.into(), id_list(rebuilt.quiz_ids()));
    update.insert(CourseStructure::META_KEY.into(), rebuilt.to_value());
    store.set_metadata(course, &update)?;

    let report = rebuilder.report;
    info!(
        %course,
        kept = report.kept,
        remapped = report.remapped,
        dropped = report.dropped,
        "course structure rebuilt"
    );
    Ok(report)
}
