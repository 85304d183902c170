//! Wire protocol shared by master and client nodes.
//!
//! All bodies are JSON. Requests carry the shared secret in
//! [`AUTH_HEADER`]; a client identifies itself to the master through
//! [`CLIENT_URL_HEADER`] and [`CLIENT_NAME_HEADER`].

use coursesync_types::{ContentItem, LocalId, RawBatchItem, SyncOutcome};
use serde::{Deserialize, Serialize};

/// Header carrying the shared secret.
pub const AUTH_HEADER: &str = "x-coursesync-key";
/// Header carrying the calling client's base URL.
pub const CLIENT_URL_HEADER: &str = "x-coursesync-client-url";
/// Header carrying the calling client's display name.
pub const CLIENT_NAME_HEADER: &str = "x-coursesync-client-name";

/// Version reported by `/verify`.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 50;

/// Body of `POST /receive`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveRequest {
    #[serde(default)]
    pub items: Vec<RawBatchItem>,
}

/// Result of syncing one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub status: SyncOutcome,
    pub stable_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    pub message: String,
}

impl ItemResult {
    pub fn error(stable_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: SyncOutcome::Error,
            stable_id: stable_id.into(),
            local_id: None,
            message: message.into(),
        }
    }
}

/// Response of `POST /receive`, and the per-batch summary of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success: bool,
    pub synced: u32,
    pub skipped: u32,
    pub errors: u32,
    pub details: Vec<ItemResult>,
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self {
            success: true,
            synced: 0,
            skipped: 0,
            errors: 0,
            details: Vec::new(),
        }
    }
}

impl BatchSummary {
    /// Counts one item result and keeps it in `details`.
    pub fn record(&mut self, result: ItemResult) {
        match result.status {
            SyncOutcome::Success => self.synced += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Error => self.errors += 1,
            SyncOutcome::Info | SyncOutcome::Debug => {}
        }
        self.details.push(result);
    }
}

/// Normalized pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Applies defaults (page 1, 10 per page) and caps `per_page` at
    /// [`MAX_PER_PAGE`].
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }
}

/// Response of `GET /content/{kind}`.
///
/// Masters serialize typed items; clients read raw JSON values so one bad
/// item does not spoil the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPage<T = ContentItem> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> ContentPage<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            total_pages: total.div_ceil(u64::from(request.per_page)),
            page: request.page,
            per_page: request.per_page,
        }
    }
}

/// Response of `GET /verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    pub site_url: String,
    pub site_name: String,
    pub version: String,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
