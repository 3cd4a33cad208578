//! HTTP client for the upstream statute store and the downstream inbox.

use async_trait::async_trait;
use lexlineage_core::{AmendmentChain, Statute, StatuteGroup};
use lexlineage_store::{StatuteSource, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP client for the statute store's list endpoint and the group inbox.
#[derive(Clone)]
pub struct SyncClient {
    client: reqwest::Client,
    base_url: String,
}

/// One page of the upstream statute listing.
#[derive(Debug, Deserialize)]
pub struct StatutePage {
    pub items: Vec<Statute>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Serialize)]
struct GroupPush<'a> {
    run_id: &'a str,
    groups: &'a [StatuteGroup],
    chains: &'a [AmendmentChain],
}

#[derive(Deserialize)]
struct PushResponse {
    accepted: u64,
}

impl SyncClient {
    /// Create a new sync client for the given base URL.
    ///
    /// `base_url` should be like `http://localhost:4000`; a trailing slash is
    /// trimmed.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn statutes_url(&self, offset: usize, limit: usize) -> String {
        format!(
            "{}/api/statutes?offset={offset}&limit={limit}",
            self.base_url
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Fetch one page of statutes from the upstream store.
    pub async fn fetch_statutes(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<StatutePage, SyncError> {
        let url = self.statutes_url(offset, limit);
        debug!(url = %url, "fetching statute page");
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        let page: StatutePage = resp.json().await?;
        debug!(count = page.items.len(), total = ?page.total, "fetched statute page");
        Ok(page)
    }

    /// Push a run's groups and chains to the downstream inbox.
    ///
    /// Returns the number of groups accepted by the server.
    pub async fn push_groups(
        &self,
        run_id: &str,
        groups: &[StatuteGroup],
        chains: &[AmendmentChain],
    ) -> Result<u64, SyncError> {
        let url = format!("{}/api/inbox/statute-groups", self.base_url);

        info!(url = %url, groups = groups.len(), chains = chains.len(), "pushing statute groups");
        let body = GroupPush {
            run_id,
            groups,
            chains,
        };
        let resp = Self::check(self.client.post(&url).json(&body).send().await?).await?;

        let result: PushResponse = resp.json().await?;
        info!(accepted = result.accepted, "push complete");
        Ok(result.accepted)
    }
}

/// [`StatuteSource`] backed by the upstream store's HTTP listing.
pub struct HttpStatuteSource {
    client: SyncClient,
}

impl HttpStatuteSource {
    pub fn new(client: SyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatuteSource for HttpStatuteSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Statute>, StoreError> {
        self.client
            .fetch_statutes(offset, limit)
            .await
            .map(|page| page.items)
            .map_err(|e| StoreError::SourceUnavailable(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("{}/api/statutes", self.client.base_url)
    }
}
