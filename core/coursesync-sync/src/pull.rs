//! Scheduled pull (client side).
//!
//! Kinds are pulled one after another, in dependency order; within a kind,
//! pages are fetched sequentially until the master reports no more. A failed
//! page is counted as one error and ends that kind only. Course structures
//! are rebuilt once every kind has been pulled, so steps pulled after their
//! course still resolve.

use crate::engine::{BatchContext, SyncEngine};
use crate::error::SyncResult;
use crate::protocol::ItemResult;
use crate::rebuild::RebuildReport;
use crate::transport::MasterApi;
use coursesync_types::{ContentKind, RawBatchItem, SyncDirection, SyncLogEntry, SyncOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-kind counters of a pull run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindReport {
    pub synced: u32,
    pub skipped: u32,
    pub errors: u32,
    pub items: Vec<ItemResult>,
}

impl KindReport {
    fn record(&mut self, result: ItemResult) {
        match result.status {
            SyncOutcome::Success => self.synced += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Error => self.errors += 1,
            SyncOutcome::Info | SyncOutcome::Debug => {}
        }
        self.items.push(result);
    }
}

/// Result of a pull run over one or more kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullReport {
    pub success: bool,
    pub synced: u32,
    pub skipped: u32,
    pub errors: u32,
    pub details: BTreeMap<ContentKind, KindReport>,
    pub rebuilt: Vec<RebuildReport>,
}

/// Pulls content from a master into the local store.
pub struct PullSync {
    engine: Arc<SyncEngine>,
    api: Arc<dyn MasterApi>,
    per_page: u32,
}

impl PullSync {
    pub fn new(engine: Arc<SyncEngine>, api: Arc<dyn MasterApi>, per_page: u32) -> Self {
        Self {
            engine,
            api,
            per_page: per_page.max(1),
        }
    }

    /// Pulls every page of each requested kind.
    pub async fn sync_all(&self, kinds: &[ContentKind]) -> SyncResult<PullReport> {
        let mut ordered: Vec<ContentKind> = kinds.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut ctx = BatchContext::new();
        let mut details = BTreeMap::new();
        for kind in ordered {
            let (report, returned) = self.pull_kind(kind, ctx).await?;
            ctx = returned;
            details.insert(kind, report);
        }

        let engine = self.engine.clone();
        let rebuilt =
            tokio::task::spawn_blocking(move || engine.finish(ctx, SyncDirection::Pull)).await?;

        let mut report = PullReport {
            success: true,
            synced: 0,
            skipped: 0,
            errors: 0,
            details,
            rebuilt,
        };
        for kind_report in report.details.values() {
            report.synced += kind_report.synced;
            report.skipped += kind_report.skipped;
            report.errors += kind_report.errors;
        }
        info!(
            synced = report.synced,
            skipped = report.skipped,
            errors = report.errors,
            "pull complete"
        );
        Ok(report)
    }

    /// Fetches one item by the master's id (local or stable) and applies it.
    /// A fetch failure is logged and returned as the error.
    pub async fn sync_item(&self, kind: ContentKind, id: &str) -> SyncResult<ItemResult> {
        let data = match self.api.fetch_item(kind, id).await {
            Ok(data) => data,
            Err(err) => {
                warn!(%kind, id, error = %err, "item fetch failed");
                self.log_failure(kind, format!("Failed to fetch {kind} {id}: {err}"))
                    .await?;
                return Err(err);
            }
        };

        let raw = RawBatchItem {
            kind: kind.path_segment().to_string(),
            data,
        };
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut ctx = BatchContext::new();
            let result = engine.receive_raw(&mut ctx, raw, SyncDirection::Pull);
            engine.finish(ctx, SyncDirection::Pull);
            result
        })
        .await?;
        info!(%kind, id, status = ?result.status, "single item pull complete");
        Ok(result)
    }

    async fn pull_kind(
        &self,
        kind: ContentKind,
        mut ctx: BatchContext,
    ) -> SyncResult<(KindReport, BatchContext)> {
        let mut report = KindReport::default();
        let mut page = 1u32;
        loop {
            let listing = match self.api.fetch_page(kind, page, self.per_page).await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(%kind, page, error = %err, "page fetch failed");
                    report.errors += 1;
                    self.log_failure(kind, format!("Failed to fetch {kind} page {page}: {err}"))
                        .await?;
                    break;
                }
            };

            let raw: Vec<RawBatchItem> = listing
                .items
                .into_iter()
                .map(|data| RawBatchItem {
                    kind: kind.path_segment().to_string(),
                    data,
                })
                .collect();
            let engine = self.engine.clone();
            let (results, returned) = tokio::task::spawn_blocking(move || {
                let results: Vec<ItemResult> = raw
                    .into_iter()
                    .map(|item| engine.receive_raw(&mut ctx, item, SyncDirection::Pull))
                    .collect();
                (results, ctx)
            })
            .await?;
            ctx = returned;
            for result in results {
                report.record(result);
            }

            if u64::from(page) >= listing.total_pages {
                break;
            }
            page += 1;
        }
        Ok((report, ctx))
    }

    async fn log_failure(&self, kind: ContentKind, message: String) -> SyncResult<()> {
        let store = self.engine.store().clone();
        tokio::task::spawn_blocking(move || {
            let entry =
                SyncLogEntry::new(SyncDirection::Pull, Some(kind), "0", SyncOutcome::Error, message);
            if let Err(err) = store.append_log(&entry) {
                warn!(error = %err, "failed to write sync log entry");
            }
        })
        .await?;
        Ok(())
    }
}
