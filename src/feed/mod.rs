//! Remote item source: the feed-list and item-detail endpoints.
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::FetchError;
use crate::model::{Item, ItemId};

const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/";
const NEW_ITEMS_PATH: &str = "v0/newstories.json";

/// The two remote calls the fetch cycle depends on. Implementations hold no
/// shared mutable state, so both calls may run concurrently.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Full snapshot of the feed, newest first.
    async fn list_ids(&self) -> Result<Vec<ItemId>, FetchError>;

    /// Single-item lookup. A tombstoned id surfaces as [`FetchError::NotFound`].
    async fn fetch_item(&self, id: ItemId) -> Result<Item, FetchError>;
}

#[derive(Clone)]
pub struct HnClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for HnClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HnClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let base_url = Url::parse(HN_API_BASE).expect("valid default feed URL");
        Self::with_base_url(base_url, timeout)
    }

    /// `timeout` bounds every request, so a hung connection fails its unit
    /// instead of stalling the batch.
    pub fn with_base_url(base_url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("hnfeed/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        let base_url = Url::parse(&cfg.feed.base_url)
            .map_err(|e| FetchError::Network(format!("invalid feed base url: {e}")))?;
        Self::with_base_url(base_url, Duration::from_secs(cfg.feed.request_timeout_secs))
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::Network(format!("invalid endpoint {path}: {e}")))
    }

    async fn get_body(&self, url: Url) -> Result<String, FetchError> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Network(format!("http {status}: {body}")));
        }
        Ok(res.text().await?)
    }
}

#[async_trait]
impl ItemSource for HnClient {
    #[instrument(skip_all)]
    async fn list_ids(&self) -> Result<Vec<ItemId>, FetchError> {
        let url = self.endpoint(NEW_ITEMS_PATH)?;
        let body = self.get_body(url).await?;
        let ids: Vec<ItemId> =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(count = ids.len(), "fetched feed");
        Ok(ids)
    }

    #[instrument(skip(self), fields(item_id = id.0))]
    async fn fetch_item(&self, id: ItemId) -> Result<Item, FetchError> {
        let url = self.endpoint(&format!("v0/item/{}.json", id.0))?;
        let body = self.get_body(url).await?;
        decode_item(id, &body)
    }
}

/// Decode an item-detail body. `null` and an empty body mean the id no
/// longer resolves.
pub fn decode_item(id: ItemId, body: &str) -> Result<Item, FetchError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::NotFound(id));
    }
    serde_json::from_str(trimmed).map_err(|e| FetchError::Decode(e.to_string()))
}
