use crate::error::{MigrateError, Result};
use crate::types::{ContentType, DestinationPort, NormalizedItem};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Client for the destination persistence API.
pub struct MnemoClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "collectionItem")]
    collection_item: Option<NormalizedItem>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default, rename = "collectionItems")]
    collection_items: Vec<NormalizedItem>,
}

impl MnemoClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// The API reports a uniqueness violation as a 409 (or a 4xx whose error
    /// body mentions the duplicate slug); everything in the 400 range that
    /// isn't a conflict is a validation rejection.
    fn classify_rejection(status: reqwest::StatusCode, error: &str, slug: &str) -> MigrateError {
        let lowered = error.to_lowercase();
        if status == reqwest::StatusCode::CONFLICT
            || (lowered.contains("duplicate") && lowered.contains("slug"))
            || lowered.contains("already exists")
        {
            MigrateError::SlugConflict {
                slug: slug.to_string(),
            }
        } else if status.is_client_error() {
            MigrateError::Validation {
                message: format!("{status}: {error}"),
            }
        } else {
            MigrateError::Api {
                message: format!("{status}: {error}"),
            }
        }
    }
}

#[async_trait::async_trait]
impl DestinationPort for MnemoClient {
    #[instrument(skip(self, item), fields(slug = %item.slug, content_type = %item.content_type))]
    async fn create_item(&self, item: &NormalizedItem) -> Result<NormalizedItem> {
        let url = format!("{}/collection-items", self.base_url);
        let resp = self
            .authorized(self.client.post(&url))
            .json(item)
            .send()
            .await?;

        let status = resp.status();
        let body: ItemResponse = resp.json().await.unwrap_or(ItemResponse {
            success: false,
            collection_item: None,
            error: Some(format!("unparseable response ({status})")),
        });

        if status.is_success() && body.success {
            let created = body.collection_item.ok_or_else(|| MigrateError::Api {
                message: "create succeeded but no item was returned".to_string(),
            })?;
            debug!("Created item {:?}", created.id);
            return Ok(created);
        }

        let error = body.error.unwrap_or_else(|| format!("create returned {status}"));
        Err(Self::classify_rejection(status, &error, &item.slug))
    }

    #[instrument(skip(self))]
    async fn find_by_slug(
        &self,
        content_type: ContentType,
        slug: &str,
    ) -> Result<Option<NormalizedItem>> {
        let url = format!("{}/collection-items", self.base_url);
        let resp = self
            .authorized(self.client.get(&url))
            .query(&[("type", content_type.as_str()), ("slug", slug)])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MigrateError::Api {
                message: format!("slug lookup for '{slug}' returned {status}"),
            });
        }

        let body: ListResponse = resp.json().await?;
        Ok(body.collection_items.into_iter().next())
    }

    #[instrument(skip(self, item), fields(slug = %item.slug))]
    async fn update_item(&self, id: &str, item: &NormalizedItem) -> Result<NormalizedItem> {
        let url = format!("{}/collection-items/{}", self.base_url, id);
        let resp = self
            .authorized(self.client.put(&url))
            .json(item)
            .send()
            .await?;

        let status = resp.status();
        let body: ItemResponse = resp.json().await.unwrap_or(ItemResponse {
            success: false,
            collection_item: None,
            error: Some(format!("unparseable response ({status})")),
        });

        if status.is_success() && body.success {
            return body.collection_item.ok_or_else(|| MigrateError::Api {
                message: "update succeeded but no item was returned".to_string(),
            });
        }

        let error = body.error.unwrap_or_else(|| format!("update returned {status}"));
        Err(Self::classify_rejection(status, &error, &item.slug))
    }
}
