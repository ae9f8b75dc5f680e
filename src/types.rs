use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of content types handled by the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Event,
    News,
    Team,
    Programme,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Event => "event",
            ContentType::News => "news",
            ContentType::Team => "team",
            ContentType::Programme => "programme",
        }
    }

    pub const ALL: [ContentType; 5] = [
        ContentType::Post,
        ContentType::Event,
        ContentType::News,
        ContentType::Team,
        ContentType::Programme,
    ];
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "post" | "posts" => Ok(ContentType::Post),
            "event" | "events" => Ok(ContentType::Event),
            "news" => Ok(ContentType::News),
            "team" | "teams" => Ok(ContentType::Team),
            "programme" | "programmes" => Ok(ContentType::Programme),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// Publication status of a normalized item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Draft,
    Published,
}

impl ItemStatus {
    /// Webflow marks drafts with an `isDraft` flag; everything else is live.
    pub fn from_is_draft(is_draft: bool) -> Self {
        if is_draft {
            ItemStatus::Draft
        } else {
            ItemStatus::Published
        }
    }
}

/// One content item as returned by the source CMS. `field_data` is an opaque
/// map keyed by kebab-case field names; recognized fields are picked out by
/// the mapper, everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    #[serde(default, rename = "isDraft")]
    pub is_draft: bool,
    #[serde(default, rename = "isArchived")]
    pub is_archived: bool,
    #[serde(default, rename = "fieldData")]
    pub field_data: serde_json::Value,
}

/// One page of source records plus the reported collection total.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcePage {
    pub items: Vec<SourceRecord>,
    pub pagination: SourcePagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcePagination {
    pub total: u64,
}

/// The internal, unified representation persisted by the destination store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub slug: String,
    pub status: ItemStatus,
    pub data: serde_json::Value,
}

/// An image reference inside an item's data. Before relocation `url` points
/// at a third-party host; after relocation it points at the owned CDN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReference {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

/// Per source record result of one migration attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    Created {
        source_id: String,
        slug: String,
        new_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        image_failures: Vec<String>,
    },
    Updated {
        source_id: String,
        slug: String,
        id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        image_failures: Vec<String>,
    },
    Skipped {
        source_id: String,
        slug: String,
        reason: String,
    },
    Failed {
        source_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slug: Option<String>,
        error: String,
    },
}

impl MigrationOutcome {
    pub fn source_id(&self) -> &str {
        match self {
            MigrationOutcome::Created { source_id, .. }
            | MigrationOutcome::Updated { source_id, .. }
            | MigrationOutcome::Skipped { source_id, .. }
            | MigrationOutcome::Failed { source_id, .. } => source_id,
        }
    }
}

/// Source Collection API consumed by the driver.
#[async_trait::async_trait]
pub trait SourcePort: Send + Sync {
    /// Fetch one page of records from a source collection.
    async fn list_items(&self, collection_id: &str, limit: u32, offset: u64) -> Result<SourcePage>;

    /// Fetch a single record by its source id.
    async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<SourceRecord>;
}

/// Destination Persistence API consumed by the driver.
#[async_trait::async_trait]
pub trait DestinationPort: Send + Sync {
    /// Create a new item. Fails with `MigrateError::SlugConflict` when the
    /// store rejects the slug as a duplicate within its type.
    async fn create_item(&self, item: &NormalizedItem) -> Result<NormalizedItem>;

    /// Look up an existing item by type + slug.
    async fn find_by_slug(
        &self,
        content_type: ContentType,
        slug: &str,
    ) -> Result<Option<NormalizedItem>>;

    /// Update an existing item in place by its internal id.
    async fn update_item(&self, id: &str, item: &NormalizedItem) -> Result<NormalizedItem>;
}
