//! HTTP transport between nodes.
//!
//! [`MasterApi`] is what a client needs from its master (listing, single
//! fetch, handshake); [`PushTransport`] is what a master needs to deliver a
//! batch to a client. Both have reqwest-backed implementations.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    AUTH_HEADER, BatchSummary, CLIENT_NAME_HEADER, CLIENT_URL_HEADER, ContentPage, ReceiveRequest,
    VerifyResponse,
};
use async_trait::async_trait;
use coursesync_types::ContentKind;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(45);

/// Operations a client performs against its master.
#[async_trait]
pub trait MasterApi: Send + Sync {
    /// Fetches one page of published content of a kind.
    async fn fetch_page(
        &self,
        kind: ContentKind,
        page: u32,
        per_page: u32,
    ) -> SyncResult<ContentPage<Value>>;

    /// Fetches a single item by the master's id.
    async fn fetch_item(&self, kind: ContentKind, id: &str) -> SyncResult<Value>;

    /// Handshake; also registers this client with the master.
    async fn verify(&self) -> SyncResult<VerifyResponse>;
}

/// A client site the master pushes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub url: String,
    pub name: String,
    pub secret: String,
}

/// Delivers a batch to a client's `/receive` endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, target: &PushTarget, request: &ReceiveRequest) -> SyncResult<BatchSummary>;
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Turns a non-success response into an error and decodes a success body.
async fn decode<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(SyncError::from_http);
    }
    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(200).collect();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::Authentication(format!("HTTP {status}: {detail}"))
        }
        StatusCode::NOT_FOUND => SyncError::NotFound(format!("HTTP {status}: {detail}")),
        _ => SyncError::Transport(format!("HTTP {status}: {detail}")),
    })
}

/// reqwest-backed [`MasterApi`].
pub struct HttpMasterApi {
    client: Client,
    master_url: String,
    secret: String,
    site_url: String,
    site_name: String,
    fetch_timeout: Duration,
    verify_timeout: Duration,
}

impl HttpMasterApi {
    /// Creates a master client. Fails when the master URL or secret is empty.
    pub fn new(
        master_url: impl Into<String>,
        secret: impl Into<String>,
        site_url: impl Into<String>,
        site_name: impl Into<String>,
    ) -> SyncResult<Self> {
        let master_url = master_url.into();
        let secret = secret.into();
        if master_url.trim().is_empty() || secret.trim().is_empty() {
            return Err(SyncError::Configuration(
                "master URL or shared secret is not configured".into(),
            ));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            master_url,
            secret,
            site_url: site_url.into(),
            site_name: site_name.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        })
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    fn get(&self, path: &str, timeout: Duration) -> RequestBuilder {
        self.client
            .get(endpoint(&self.master_url, path))
            .header(AUTH_HEADER, &self.secret)
            .timeout(timeout)
    }
}

#[async_trait]
impl MasterApi for HttpMasterApi {
    async fn fetch_page(
        &self,
        kind: ContentKind,
        page: u32,
        per_page: u32,
    ) -> SyncResult<ContentPage<Value>> {
        debug!(%kind, page, per_page, "fetching content page");
        let response = self
            .get(&format!("content/{}", kind.path_segment()), self.fetch_timeout)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(SyncError::from_http)?;
        decode(response).await
    }

    async fn fetch_item(&self, kind: ContentKind, id: &str) -> SyncResult<Value> {
        let response = self
            .get(&format!("content/{}/{id}", kind.path_segment()), self.fetch_timeout)
            .send()
            .await
            .map_err(SyncError::from_http)?;
        decode(response).await
    }

    async fn verify(&self) -> SyncResult<VerifyResponse> {
        let name = if self.site_name.is_empty() { &self.site_url } else { &self.site_name };
        let response = self
            .get("verify", self.verify_timeout)
            .header(CLIENT_URL_HEADER, &self.site_url)
            .header(CLIENT_NAME_HEADER, name)
            .send()
            .await
            .map_err(SyncError::from_http)?;
        decode(response).await
    }
}

/// reqwest-backed [`PushTransport`] with a per-request timeout.
pub struct HttpPushTransport {
    client: Client,
    timeout: Duration,
}

impl HttpPushTransport {
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn push(&self, target: &PushTarget, request: &ReceiveRequest) -> SyncResult<BatchSummary> {
        debug!(url = %target.url, items = request.items.len(), "pushing batch");
        let response = self
            .client
            .post(endpoint(&target.url, "receive"))
            .header(AUTH_HEADER, &target.secret)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(SyncError::from_http)?;
        decode(response).await
    }
}
