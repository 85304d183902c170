//! HTTP API and service wiring for a CourseSync node.
//!
//! One binary plays either role. A master serves its published content
//! (`/content/...`) and answers the client handshake (`/verify`); a client
//! accepts pushed batches (`/receive`). Every route except `/test` requires
//! the shared secret in `X-CourseSync-Key`.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod tasks;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use config::{Mode, NodeConfig};
use coursesync_store::ContentStore;
use coursesync_sync::protocol::{
    AUTH_HEADER, CLIENT_NAME_HEADER, CLIENT_URL_HEADER, PROTOCOL_VERSION,
};
use coursesync_sync::{
    BatchSummary, ContentPage, Exporter, HttpMasterApi, HttpPushTransport, PageRequest,
    PullSync, PushCoordinator, ReceiveRequest, SyncEngine, SyncError, SyncResult,
    UpdateNotifier, VerifyResponse,
};
use coursesync_types::{ContentItem, ContentKind, LocalId, StableId, SyncDirection};
use error::ApiError;
use ratelimit::RateLimiter;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Requests per minute `/test` accepts from one address.
pub const TEST_RATE_LIMIT: u32 = 10;

/// Services shared by every request handler.
pub struct AppState {
    pub config: Arc<NodeConfig>,
    pub store: Arc<ContentStore>,
    pub engine: Arc<SyncEngine>,
    pub exporter: Arc<Exporter>,
    test_limiter: RateLimiter,
}

impl AppState {
    /// Wires the services for `config` around `store`. On a master, local
    /// edits start being recorded in the sync log.
    pub fn new(config: NodeConfig, store: Arc<ContentStore>) -> Arc<Self> {
        if config.mode == Mode::Master {
            store.hooks().register(Arc::new(UpdateNotifier));
        }
        let engine = Arc::new(SyncEngine::new(store.clone(), config.sync.conflict_policy));
        let exporter = Arc::new(Exporter::new(store.clone()));
        Arc::new(Self {
            config: Arc::new(config),
            store,
            engine,
            exporter,
            test_limiter: RateLimiter::per_minute(TEST_RATE_LIMIT),
        })
    }

    /// Client of the configured master.
    pub fn master_api(&self) -> SyncResult<HttpMasterApi> {
        let client = &self.config.client;
        Ok(HttpMasterApi::new(
            client.master_url.clone(),
            client.master_secret.clone(),
            self.config.site_url.clone(),
            self.config.display_name().to_string(),
        )?
        .with_fetch_timeout(self.config.fetch_timeout())
        .with_verify_timeout(self.config.verify_timeout()))
    }

    pub fn pull_sync(&self) -> SyncResult<PullSync> {
        Ok(PullSync::new(
            self.engine.clone(),
            Arc::new(self.master_api()?),
            self.config.sync.batch_size,
        ))
    }

    pub fn push_coordinator(&self) -> SyncResult<PushCoordinator> {
        Ok(PushCoordinator::new(
            self.store.clone(),
            self.exporter.clone(),
            Arc::new(HttpPushTransport::new(self.config.push_timeout())?),
        ))
    }
}

/// Response of the unauthenticated liveness probe.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TestResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    page: Option<u32>,
    per_page: Option<u32>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Missing key → 401; wrong key, or no secret configured → 403.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(provided) = header_str(headers, AUTH_HEADER) else {
        return Err(ApiError::missing_key());
    };
    let expected = state.config.shared_secret.trim();
    if expected.is_empty() || !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return Err(ApiError::invalid_key());
    }
    Ok(())
}

fn parse_kind(segment: &str) -> Result<ContentKind, ApiError> {
    segment.parse().map_err(|_| {
        ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_content_type",
            "Invalid content type.",
        )
    })
}

async fn receive_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ReceiveRequest>, JsonRejection>,
) -> Result<Json<BatchSummary>, ApiError> {
    authorize(&state, &headers)?;
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    info!(items = request.items.len(), "receiving batch");

    let engine = state.engine.clone();
    let summary =
        tokio::task::spawn_blocking(move || engine.receive_batch(request.items, SyncDirection::Push))
            .await?;
    info!(
        synced = summary.synced,
        skipped = summary.skipped,
        errors = summary.errors,
        "batch received"
    );
    Ok(Json(summary))
}

async fn list_content_handler(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ContentPage>, ApiError> {
    authorize(&state, &headers)?;
    let kind = parse_kind(&kind)?;
    let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = PageRequest::new(params.page, params.per_page);
    debug!(%kind, page = request.page, per_page = request.per_page, "listing content");

    let exporter = state.exporter.clone();
    let page = tokio::task::spawn_blocking(move || exporter.export_page(kind, request)).await??;
    Ok(Json(page))
}

async fn get_content_handler(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ContentItem>, ApiError> {
    authorize(&state, &headers)?;
    let kind = parse_kind(&kind)?;

    let store = state.store.clone();
    let exporter = state.exporter.clone();
    let item = tokio::task::spawn_blocking(move || -> SyncResult<ContentItem> {
        let local = match id.parse::<i64>() {
            Ok(n) => LocalId::new(n),
            Err(_) => {
                let stable = StableId::new(id.as_str())?;
                store
                    .find_by_stable_id(&stable)?
                    .map(|r| r.local_id)
                    .ok_or_else(|| SyncError::NotFound(format!("content {id}")))?
            }
        };
        Ok(exporter.export_item(kind, local)?.item)
    })
    .await??;
    Ok(Json(item))
}

async fn verify_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, ApiError> {
    authorize(&state, &headers)?;

    if let Some(url) = header_str(&headers, CLIENT_URL_HEADER) {
        let url = url.to_string();
        let name = header_str(&headers, CLIENT_NAME_HEADER).unwrap_or(&url).to_string();
        info!(%url, %name, "client verified");
        let store = state.store.clone();
        tokio::task::spawn_blocking(move || store.touch_client(&url, &name, Utc::now()))
            .await?
            .map_err(SyncError::from)?;
    }

    Ok(Json(VerifyResponse {
        success: true,
        message: "Connection verified successfully.".to_string(),
        site_url: state.config.site_url.clone(),
        site_name: state.config.display_name().to_string(),
        version: PROTOCOL_VERSION.to_string(),
    }))
}

async fn test_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Json<TestResponse>, ApiError> {
    if !state.test_limiter.check(addr.ip()) {
        debug!(ip = %addr.ip(), "test endpoint rate limited");
        return Err(ApiError::rate_limited());
    }
    Ok(Json(TestResponse {
        status: "success".to_string(),
        message: "CourseSync API is working".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Build the HTTP API router.
///
/// `/test` reads the peer address, so serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/receive", post(receive_handler))
        .route("/content/{kind}", get(list_content_handler))
        .route("/content/{kind}/{id}", get(get_content_handler))
        .route("/verify", get(verify_handler))
        .route("/test", get(test_handler))
        .with_state(state)
}
