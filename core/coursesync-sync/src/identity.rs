//! Stable identifier assignment.
//!
//! A record's stable id is generated once, by the node the record originates
//! on, and never changes afterwards. Assignment goes through the store's
//! compare-and-set so concurrent callers converge on a single id.

use crate::error::SyncResult;
use coursesync_store::ContentStore;
use coursesync_types::{ContentKind, LocalId, StableId};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a backfill over one content kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub total: usize,
    pub newly_assigned: usize,
    pub already_present: usize,
}

/// Returns the record's stable id, generating and persisting one if absent.
pub fn ensure_stable_id(store: &ContentStore, id: LocalId) -> SyncResult<StableId> {
    let record = store.require(id)?;
    if let Some(existing) = record.stable_id {
        return Ok(existing);
    }
    let candidate = StableId::generate();
    let assigned = store.set_stable_id_if_absent(id, &candidate)?;
    if assigned == candidate {
        debug!(%id, stable_id = %assigned, "assigned stable id");
    }
    Ok(assigned)
}

/// Assigns stable ids to every record of `kind` that lacks one.
pub fn ensure_all(store: &ContentStore, kind: ContentKind) -> SyncResult<BackfillReport> {
    let mut report = BackfillReport::default();
    for id in store.ids_of_kind(kind)? {
        report.total += 1;
        let before = store.require(id)?.stable_id;
        match before {
            Some(_) => report.already_present += 1,
            None => {
                ensure_stable_id(store, id)?;
                report.newly_assigned += 1;
            }
        }
    }
    info!(
        %kind,
        total = report.total,
        newly_assigned = report.newly_assigned,
        "stable id backfill complete"
    );
    Ok(report)
}
