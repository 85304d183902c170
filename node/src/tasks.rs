//! Jobs that run on a schedule while the node is serving.

use crate::AppState;
use crate::config::Mode;
use chrono::{Duration as ChronoDuration, Utc};
use coursesync_store::{ContentStore, StoreResult};
use coursesync_sync::{PullReport, SyncError, SyncResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

const PURGE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Pulls every enabled kind from the configured master.
pub async fn run_pull(state: &AppState) -> SyncResult<PullReport> {
    let kinds = state.config.enabled_kinds();
    if kinds.is_empty() {
        return Err(SyncError::Configuration("no content kinds are enabled".into()));
    }
    state.pull_sync()?.sync_all(&kinds).await
}

/// Deletes sync log entries older than `retention_days`.
pub fn purge_logs(store: &ContentStore, retention_days: u32) -> StoreResult<usize> {
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
    store.purge_logs_before(cutoff)
}

/// Starts the periodic pull on a client with `auto_sync` on. The first run
/// happens one interval after startup.
pub fn spawn_scheduled_pull(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let client = &state.config.client;
    if state.config.mode != Mode::Client || !client.auto_sync {
        return None;
    }
    let period = client.sync_interval.period();
    info!(interval = ?client.sync_interval, "scheduled pull enabled");

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match run_pull(&state).await {
                Ok(report) => info!(
                    synced = report.synced,
                    skipped = report.skipped,
                    errors = report.errors,
                    "scheduled pull finished"
                ),
                Err(err) => error!(error = %err, "scheduled pull failed"),
            }
        }
    }))
}

/// Starts the daily sync log purge.
pub fn spawn_log_purge(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now(), PURGE_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let store = state.store.clone();
            let days = state.config.log_retention_days;
            match tokio::task::spawn_blocking(move || purge_logs(&store, days)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(purged)) => info!(purged, "old sync log entries removed"),
                Ok(Err(err)) => warn!(error = %err, "sync log purge failed"),
                Err(err) => warn!(error = %err, "sync log purge task failed"),
            }
        }
    })
}
