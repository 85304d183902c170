//! Local edit notices on a master.

use coursesync_store::{ContentRecord, ContentStore, SaveObserver};
use coursesync_types::{SyncDirection, SyncLogEntry, SyncOutcome};
use tracing::{debug, info, warn};

/// Logs an `update` entry whenever content is saved outside a sync.
///
/// Notifying clients in real time is not supported; the log entry is the
/// only record of the edit.
#[derive(Debug, Default)]
pub struct UpdateNotifier;

impl SaveObserver for UpdateNotifier {
    fn on_content_saved(&self, store: &ContentStore, record: &ContentRecord, created: bool) {
        let content_ref = record
            .stable_id
            .as_ref()
            .map_or_else(|| record.local_id.to_string(), ToString::to_string);
        let entry = SyncLogEntry::new(
            SyncDirection::Update,
            Some(record.kind),
            content_ref,
            SyncOutcome::Info,
            format!("Content updated: {}", record.title),
        );
        if let Err(err) = store.append_log(&entry) {
            warn!(error = %err, "failed to record content update");
            return;
        }
        info!(id = %record.local_id, kind = %record.kind, created, "content updated");
        debug!("client notification not sent; clients pick changes up on their next pull");
    }
}
