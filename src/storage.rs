use crate::constants::{GCS_API_BASE, GCS_UPLOAD_BASE};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Object storage backing the CDN. Public URL for an uploaded object is
/// always `{public base}/{path}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload bytes to `path` and return the public URL.
    async fn upload(
        &self,
        bytes: &[u8],
        path: &str,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Google Cloud Storage via the JSON API, authenticated with an OAuth access
/// token. Uploads use the multipart endpoint so cacheControl lands in the
/// same request as the bytes.
pub struct GcsStore {
    client: reqwest::Client,
    bucket: String,
    token: String,
    public_base_url: String,
}

impl GcsStore {
    pub fn new(bucket: String, token: String, public_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket,
            token,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Object names appear as a single URL path segment in the JSON API, so
    /// slashes inside the path must be percent-encoded. Our paths are plain
    /// ASCII (slug-derived), slashes are the only character needing care.
    fn encoded_object_name(path: &str) -> String {
        path.replace('/', "%2F")
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn upload(
        &self,
        bytes: &[u8],
        path: &str,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String> {
        let boundary = format!("mnemo_migrate_{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": path,
            "contentType": content_type,
            "cacheControl": cache_control,
        });

        let mut body: Vec<u8> = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let endpoint = format!(
            "{}/b/{}/o?uploadType=multipart",
            GCS_UPLOAD_BASE, self.bucket
        );
        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(MigrateError::Api {
                message: format!("GCS upload failed for '{path}': {status} - {detail}"),
            });
        }

        debug!("Uploaded {} bytes to gs://{}/{}", bytes.len(), self.bucket, path);
        Ok(format!("{}/{}", self.public_base_url, path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let endpoint = format!(
            "{}/b/{}/o/{}",
            GCS_API_BASE,
            self.bucket,
            Self::encoded_object_name(path)
        );
        let resp = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => Err(MigrateError::Api {
                message: format!("GCS metadata check failed for '{path}': {s}"),
            }),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let endpoint = format!(
            "{}/b/{}/o/{}",
            GCS_API_BASE,
            self.bucket,
            Self::encoded_object_name(path)
        );
        let resp = self
            .client
            .delete(&endpoint)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(MigrateError::Api {
                message: format!("GCS delete failed for '{path}': {status}"),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// In-memory object store for development/testing.
pub struct InMemoryStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    public_base_url: String,
}

impl InMemoryStore {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn upload(
        &self,
        bytes: &[u8],
        path: &str,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                cache_control: cache_control.to_string(),
            },
        );
        debug!("Stored {} bytes at {}", bytes.len(), path);
        Ok(format!("{}/{}", self.public_base_url, path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }
}
