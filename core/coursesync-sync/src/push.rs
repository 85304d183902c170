//! Push on demand (master side).
//!
//! The selected content is exported once and sent to every client that has a
//! push secret, one client at a time. Each client gets its own timeout, and
//! its outcome is logged as soon as it is known, so one slow or failing site
//! never holds back or hides the others.

use crate::error::{SyncError, SyncResult};
use crate::exporter::Exporter;
use crate::protocol::ReceiveRequest;
use crate::transport::{PushTarget, PushTransport};
use coursesync_store::ContentStore;
use coursesync_types::{
    BatchItem, ContentKind, LocalId, SyncDirection, SyncLogEntry, SyncOutcome,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of pushing to one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteResult {
    pub site_url: String,
    pub site_name: String,
    pub success: bool,
    pub message: String,
}

/// Outcome of a push to all clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub success: u32,
    pub failed: u32,
    pub details: Vec<SiteResult>,
    /// Set when nothing was attempted (no clients, no content).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PushReport {
    fn empty(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// Exports content and delivers it to registered clients.
pub struct PushCoordinator {
    store: Arc<ContentStore>,
    exporter: Arc<Exporter>,
    transport: Arc<dyn PushTransport>,
}

impl PushCoordinator {
    pub fn new(
        store: Arc<ContentStore>,
        exporter: Arc<Exporter>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            store,
            exporter,
            transport,
        }
    }

    /// Clients with a push secret.
    pub fn targets(&self) -> SyncResult<Vec<PushTarget>> {
        Ok(self
            .store
            .push_targets()?
            .into_iter()
            .filter_map(|c| {
                let secret = c.push_secret?;
                Some(PushTarget {
                    url: c.endpoint_url,
                    name: c.display_name,
                    secret,
                })
            })
            .collect())
    }

    /// Pushes the full tree of each course.
    pub async fn push_courses(&self, courses: &[LocalId]) -> SyncResult<PushReport> {
        if courses.is_empty() {
            return Ok(PushReport::empty("No courses selected"));
        }
        let exporter = self.exporter.clone();
        let courses = courses.to_vec();
        let items = tokio::task::spawn_blocking(move || -> SyncResult<Vec<BatchItem>> {
            let mut items = Vec::new();
            for course in courses {
                items.extend(exporter.export_tree(course)?);
            }
            Ok(items)
        })
        .await??;
        self.push_items(items).await
    }

    /// Pushes a single record.
    pub async fn push_item(&self, kind: ContentKind, id: LocalId) -> SyncResult<PushReport> {
        let exporter = self.exporter.clone();
        let item = tokio::task::spawn_blocking(move || exporter.export_item(kind, id)).await??;
        self.push_items(vec![item]).await
    }

    /// Sends an exported batch to every push target in turn.
    pub async fn push_items(&self, items: Vec<BatchItem>) -> SyncResult<PushReport> {
        let targets = self.targets()?;
        if targets.is_empty() {
            return Ok(PushReport::empty("No client sites configured"));
        }
        if items.is_empty() {
            return Ok(PushReport::empty("No content found to push"));
        }

        let request = ReceiveRequest {
            items: items.into_iter().map(BatchItem::into_raw).collect(),
        };
        let mut report = PushReport::default();
        for target in &targets {
            let site = match self.transport.push(target, &request).await {
                Ok(summary) => SiteResult {
                    site_url: target.url.clone(),
                    site_name: target.name.clone(),
                    success: true,
                    message: format!(
                        "Synced {}, skipped {}, errors {}",
                        summary.synced, summary.skipped, summary.errors
                    ),
                },
                Err(err) => {
                    warn!(url = %target.url, error = %err, "push failed");
                    SiteResult {
                        site_url: target.url.clone(),
                        site_name: target.name.clone(),
                        success: false,
                        message: push_error_message(&err),
                    }
                }
            };
            self.log_site(&site, request.items.len());
            if site.success {
                report.success += 1;
            } else {
                report.failed += 1;
            }
            report.details.push(site);
        }

        info!(success = report.success, failed = report.failed, "push complete");
        Ok(report)
    }

    fn log_site(&self, site: &SiteResult, items: usize) {
        let (outcome, verb) = if site.success {
            (SyncOutcome::Success, "Pushed")
        } else {
            (SyncOutcome::Error, "Failed to push")
        };
        let entry = SyncLogEntry::new(
            SyncDirection::Push,
            None,
            "0",
            outcome,
            format!("{verb} {items} items to {}: {}", site.site_url, site.message),
        );
        if let Err(err) = self.store.append_log(&entry) {
            warn!(error = %err, "failed to write sync log entry");
        }
    }
}

fn push_error_message(err: &SyncError) -> String {
    match err {
        SyncError::Timeout(_) => format!("Request timed out: {err}"),
        other => other.to_string(),
    }
}
