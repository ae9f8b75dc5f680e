use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_DELAY_MS,
};
use crate::error::{MigrateError, Result};
use crate::types::ContentType;
use std::collections::HashMap;
use std::env;

/// Runtime configuration, built once at process start from the environment
/// and passed by parameter into each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the source CMS API.
    pub webflow_token: String,
    /// Source collection id per content type. Types without a configured
    /// collection simply cannot be migrated in this run.
    pub collections: HashMap<ContentType, String>,
    /// Base URL of the destination persistence API.
    pub mnemo_base_url: String,
    /// Optional bearer token for the destination API.
    pub mnemo_token: Option<String>,
    /// Destination bucket for relocated images.
    pub gcs_bucket: String,
    /// OAuth access token used for bucket operations.
    pub gcs_token: String,
    /// Public base URL under which relocated assets are served.
    pub cdn_base_url: String,

    pub page_size: u32,
    pub batch_size: usize,
    pub request_delay_ms: u64,
    pub download_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let webflow_token = require("WEBFLOW_API_TOKEN")?;
        let mnemo_base_url = require("MNEMO_API_BASE_URL")?;
        let gcs_bucket = require("GCS_BUCKET")?;
        let gcs_token = require("GCS_ACCESS_TOKEN")?;
        let cdn_base_url = require("CDN_BASE_URL")?;
        let mnemo_token = env::var("MNEMO_API_TOKEN").ok().filter(|v| !v.is_empty());

        let mut collections = HashMap::new();
        for content_type in ContentType::ALL {
            let var = format!(
                "WEBFLOW_COLLECTION_{}",
                content_type.as_str().to_uppercase()
            );
            if let Ok(id) = env::var(&var) {
                if !id.trim().is_empty() {
                    collections.insert(content_type, id.trim().to_string());
                }
            }
        }

        Ok(Self {
            webflow_token,
            collections,
            mnemo_base_url: mnemo_base_url.trim_end_matches('/').to_string(),
            mnemo_token,
            gcs_bucket,
            gcs_token,
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
            page_size: parse_or("PAGE_SIZE", DEFAULT_PAGE_SIZE),
            batch_size: parse_or("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            request_delay_ms: parse_or("REQUEST_DELAY_MS", DEFAULT_REQUEST_DELAY_MS),
            download_timeout_secs: parse_or("DOWNLOAD_TIMEOUT_SECS", DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        })
    }

    /// Source collection id for a content type, or a configuration error
    /// naming the missing variable.
    pub fn collection_id(&self, content_type: ContentType) -> Result<&str> {
        self.collections
            .get(&content_type)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "No collection configured for '{}' (set WEBFLOW_COLLECTION_{})",
                    content_type,
                    content_type.as_str().to_uppercase()
                ))
            })
    }
}

fn require(var: &str) -> Result<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(MigrateError::Config(format!(
            "Missing required environment variable '{var}'"
        ))),
    }
}

fn parse_or<T: std::str::FromStr + Copy>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
