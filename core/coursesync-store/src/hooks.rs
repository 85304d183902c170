//! Save observers and replication suppression.
//!
//! Observers are told about every record the store creates or updates, except
//! while a [`SuppressionGuard`] is alive. The sync engine holds a guard while
//! it applies incoming content so that replicated writes are not reported back
//! as local edits.
//!
//! Suppression is store-wide, not per caller: while any guard is held, saves
//! made through the same store on other threads (an admin edit racing a
//! receive or a pull, say) are not reported either.

use crate::{ContentRecord, ContentStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Receives a callback after a record is written.
pub trait SaveObserver: Send + Sync {
    fn on_content_saved(&self, store: &ContentStore, record: &ContentRecord, created: bool);
}

/// Registered observers plus the suppression depth.
#[derive(Default)]
pub struct ReplicationHooks {
    observers: RwLock<Vec<Arc<dyn SaveObserver>>>,
    suppressed: AtomicUsize,
}

impl ReplicationHooks {
    pub fn register(&self, observer: Arc<dyn SaveObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// Suppresses observers for every writer of this store until the returned
    /// guard is dropped. Guards nest.
    pub fn suppress(&self) -> SuppressionGuard<'_> {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        SuppressionGuard { hooks: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn notify(&self, store: &ContentStore, record: &ContentRecord, created: bool) {
        if self.is_suppressed() {
            debug!(id = %record.local_id, "save observers suppressed");
            return;
        }
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => return,
        };
        for observer in observers {
            observer.on_content_saved(store, record, created);
        }
    }
}

/// Keeps save observers silent while alive.
#[must_use = "observers are only suppressed while the guard is held"]
pub struct SuppressionGuard<'a> {
    hooks: &'a ReplicationHooks,
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.hooks.suppressed.fetch_sub(1, Ordering::SeqCst);
    }
}
