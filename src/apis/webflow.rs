use crate::constants::WEBFLOW_API_BASE;
use crate::error::{MigrateError, Result};
use crate::types::{SourcePage, SourcePort, SourceRecord};
use tracing::{debug, instrument};

/// Client for the source CMS collections API (Webflow v2).
pub struct WebflowClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WebflowClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, WEBFLOW_API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SourcePort for WebflowClient {
    #[instrument(skip(self))]
    async fn list_items(&self, collection_id: &str, limit: u32, offset: u64) -> Result<SourcePage> {
        let url = format!("{}/collections/{}/items", self.base_url, collection_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(|e| MigrateError::SourceFetch {
                message: format!("list items at offset {offset} failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(MigrateError::SourceFetch {
                message: format!("list items at offset {offset} returned {status}: {detail}"),
            });
        }

        let page: SourcePage = resp.json().await.map_err(|e| MigrateError::SourceFetch {
            message: format!("list items at offset {offset} returned invalid JSON: {e}"),
        })?;
        debug!(
            "Fetched {} items (offset {}, total {})",
            page.items.len(),
            offset,
            page.pagination.total
        );
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<SourceRecord> {
        let url = format!(
            "{}/collections/{}/items/{}",
            self.base_url, collection_id, item_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| MigrateError::SourceFetch {
                message: format!("get item {item_id} failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MigrateError::SourceFetch {
                message: format!("get item {item_id} returned {status}"),
            });
        }
        resp.json().await.map_err(|e| MigrateError::SourceFetch {
            message: format!("get item {item_id} returned invalid JSON: {e}"),
        })
    }
}
