use crate::constants::{COLLECTION_PATH_PREFIX, IMAGE_CACHE_CONTROL, JPEG_QUALITY};
use crate::storage::ObjectStore;
use crate::types::ContentType;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// A single image field that could not be relocated. Non-fatal: the caller
/// keeps the original URL and records the failure alongside the item outcome.
#[derive(Debug, Clone)]
pub struct RelocationFailure {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for RelocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.reason)
    }
}

/// Downloads externally-hosted images, optionally re-encodes them, uploads
/// them to the owned bucket, and returns the CDN URL they will serve from.
pub struct Relocator {
    client: reqwest::Client,
    store: Arc<dyn ObjectStore>,
    cdn_base_url: String,
    download_timeout: Duration,
}

impl Relocator {
    pub fn new(store: Arc<dyn ObjectStore>, cdn_base_url: &str, download_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            store,
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
            download_timeout,
        }
    }

    /// True when the URL is already served from the owned CDN host.
    pub fn is_cdn_url(&self, url: &str) -> bool {
        match (
            reqwest::Url::parse(url),
            reqwest::Url::parse(&self.cdn_base_url),
        ) {
            (Ok(candidate), Ok(cdn)) => candidate.host_str() == cdn.host_str(),
            _ => url.starts_with(&self.cdn_base_url),
        }
    }

    /// Deterministic bucket path for a relocated image. The same inputs
    /// always produce the same path, so re-runs overwrite instead of
    /// duplicating.
    pub fn destination_path(
        content_type: ContentType,
        slug: &str,
        field_name: &str,
        source_url: &str,
        reencode: bool,
    ) -> String {
        let mut filename = original_filename(source_url);
        if reencode {
            filename = replace_extension(&filename, "jpg");
        }
        format!(
            "{}/{}/{}/{}-{}",
            COLLECTION_PATH_PREFIX,
            content_type.as_str(),
            slug,
            field_name,
            filename
        )
    }

    /// Relocate one image URL. Empty and already-relocated URLs are returned
    /// unchanged with zero network calls.
    #[instrument(skip(self), fields(content_type = %content_type, slug = %slug, field = %field_name))]
    pub async fn relocate(
        &self,
        source_url: &str,
        content_type: ContentType,
        slug: &str,
        field_name: &str,
        reencode: bool,
    ) -> std::result::Result<String, RelocationFailure> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Ok(String::new());
        }
        if self.is_cdn_url(source_url) {
            debug!("URL already on CDN host, leaving untouched");
            return Ok(source_url.to_string());
        }

        let fail = |reason: String| RelocationFailure {
            url: source_url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(source_url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(format!(
                        "download timeout after {}s",
                        self.download_timeout.as_secs()
                    ))
                } else {
                    fail(format!("download failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("download returned {status}")));
        }

        let original_content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| fail(format!("download failed: {e}")))?;

        let (upload_bytes, upload_content_type) = if reencode {
            let jpeg = reencode_jpeg(&bytes).map_err(|e| fail(format!("re-encode failed: {e}")))?;
            (jpeg, "image/jpeg".to_string())
        } else {
            (bytes.to_vec(), original_content_type)
        };

        let path = Self::destination_path(content_type, slug, field_name, source_url, reencode);
        let cdn_url = self
            .store
            .upload(&upload_bytes, &path, &upload_content_type, IMAGE_CACHE_CONTROL)
            .await
            .map_err(|e| {
                warn!("Upload failed for {}: {}", path, e);
                fail(format!("upload failed: {e}"))
            })?;

        debug!("Relocated {} -> {}", source_url, cdn_url);
        Ok(cdn_url)
    }
}

/// Last path segment of the URL with query/fragment stripped.
fn original_filename(source_url: &str) -> String {
    let without_query = source_url
        .split(['?', '#'])
        .next()
        .unwrap_or(source_url)
        .trim_end_matches('/');
    let name = without_query.rsplit('/').next().unwrap_or("");
    if name.is_empty() {
        "image".to_string()
    } else {
        name.to_string()
    }
}

fn replace_extension(filename: &str, ext: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{ext}"),
        _ => format!("{filename}.{ext}"),
    }
}

/// Re-encode arbitrary image bytes as JPEG at the fixed migration quality.
fn reencode_jpeg(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    const CDN: &str = "https://cdn.example";

    fn relocator_with_store() -> (Relocator, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new(CDN));
        let relocator = Relocator::new(store.clone(), CDN, Duration::from_secs(5));
        (relocator, store)
    }

    #[test]
    fn destination_path_is_deterministic() {
        let a = Relocator::destination_path(
            ContentType::Post,
            "my-post",
            "hero-image",
            "https://thirdparty.example/img.jpg",
            false,
        );
        let b = Relocator::destination_path(
            ContentType::Post,
            "my-post",
            "hero-image",
            "https://thirdparty.example/img.jpg",
            false,
        );
        assert_eq!(a, b);
        assert_eq!(a, "website/collection/post/my-post/hero-image-img.jpg");
    }

    #[test]
    fn destination_path_strips_query_strings() {
        let path = Relocator::destination_path(
            ContentType::News,
            "big-story",
            "hero-image",
            "https://thirdparty.example/photos/shot.png?w=1200&fit=crop",
            false,
        );
        assert_eq!(path, "website/collection/news/big-story/hero-image-shot.png");
    }

    #[test]
    fn reencoded_path_gets_jpg_extension() {
        let path = Relocator::destination_path(
            ContentType::Team,
            "jane-doe",
            "photo",
            "https://thirdparty.example/jane.png",
            true,
        );
        assert_eq!(path, "website/collection/team/jane-doe/photo-jane.jpg");
    }

    #[test]
    fn cdn_urls_are_recognized_by_host() {
        let (relocator, _) = relocator_with_store();
        assert!(relocator.is_cdn_url("https://cdn.example/website/collection/post/x/hero.jpg"));
        assert!(!relocator.is_cdn_url("https://thirdparty.example/img.jpg"));
    }

    #[tokio::test]
    async fn relocating_a_cdn_url_is_a_no_op() {
        let (relocator, store) = relocator_with_store();
        let url = "https://cdn.example/website/collection/post/my-post/hero-image-img.jpg";
        let result = relocator
            .relocate(url, ContentType::Post, "my-post", "hero-image", false)
            .await
            .unwrap();
        assert_eq!(result, url);
        // No download, no upload
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn relocating_an_empty_url_is_a_no_op() {
        let (relocator, store) = relocator_with_store();
        let result = relocator
            .relocate("", ContentType::Post, "my-post", "hero-image", false)
            .await
            .unwrap();
        assert_eq!(result, "");
        assert_eq!(store.object_count(), 0);
    }
}
