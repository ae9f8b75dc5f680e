/// Path prefix for relocated website assets inside the bucket.
pub const COLLECTION_PATH_PREFIX: &str = "website/collection";

/// Cache policy for relocated images. Destination paths are addressed by
/// slug + field, not content hash, so replacing an image without changing
/// slug/field keeps serving the cached bytes until the cache expires.
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Quality used when re-encoding images to JPEG.
pub const JPEG_QUALITY: u8 = 80;

/// Maximum create attempts per item when resolving slug conflicts by suffix.
pub const MAX_SLUG_ATTEMPTS: u32 = 5;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_BATCH_SIZE: usize = 4;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Webflow API base URL (v2).
pub const WEBFLOW_API_BASE: &str = "https://api.webflow.com/v2";

/// GCS JSON API endpoints.
pub const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
pub const GCS_API_BASE: &str = "https://storage.googleapis.com/storage/v1";
