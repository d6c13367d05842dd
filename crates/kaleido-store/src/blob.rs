//! Blob storage for generated documents, metadata and images
//!
//! Backends:
//! - [`VercelBlobStore`] for the hosted blob REST API
//! - [`MemoryBlobStore`] for tests and single-process runs
//! - [`NullBlobStore`] when no credentials are configured; every write is skipped

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One stored blob as reported by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    pub url: String,
    pub pathname: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: u64,
}

/// Named binary objects with public URLs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `pathname`, replacing any previous object
    ///
    /// Returns the public URL, or `None` when the store skips writes.
    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Fetch an object by pathname
    async fn get(&self, pathname: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// List objects whose pathname starts with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError>;

    /// Delete objects by URL, returning how many were removed
    async fn delete(&self, urls: &[String]) -> Result<usize, StoreError>;

    /// Whether writes go anywhere
    fn is_configured(&self) -> bool {
        true
    }
}

/// Blob store that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBlobStore;

#[async_trait]
impl BlobStore for NullBlobStore {
    async fn put(&self, pathname: &str, _: Vec<u8>, _: &str) -> Result<Option<String>, StoreError> {
        tracing::debug!(pathname, "blob store not configured, skipping put");
        Ok(None)
    }

    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn list(&self, _: &str) -> Result<Vec<BlobEntry>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _: &[String]) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct MemoryBlob {
    bytes: Vec<u8>,
    uploaded_at: DateTime<Utc>,
}

/// In-process blob store; URLs use the `memory://` scheme
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, MemoryBlob>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn url_for(pathname: &str) -> String {
        format!("memory://{pathname}")
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<Option<String>, StoreError> {
        self.blobs.write().insert(
            pathname.to_string(),
            MemoryBlob {
                bytes,
                uploaded_at: Utc::now(),
            },
        );
        Ok(Some(Self::url_for(pathname)))
    }

    async fn get(&self, pathname: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().get(pathname).map(|b| b.bytes.clone()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        Ok(self
            .blobs
            .read()
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, blob)| BlobEntry {
                url: Self::url_for(path),
                pathname: path.clone(),
                uploaded_at: Some(blob.uploaded_at),
                size: blob.bytes.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, urls: &[String]) -> Result<usize, StoreError> {
        let mut blobs = self.blobs.write();
        Ok(urls
            .iter()
            .filter_map(|url| url.strip_prefix("memory://"))
            .filter(|path| blobs.remove(*path).is_some())
            .count())
    }
}

/// Default blob API endpoint
pub const VERCEL_BLOB_API: &str = "https://blob.vercel-storage.com";

/// Connection settings for [`VercelBlobStore`]
#[derive(Debug, Clone)]
pub struct VercelBlobConfig {
    pub token: String,
    pub api_url: String,
    /// Public base URL of the store; reads go straight there when set
    pub public_base_url: Option<String>,
    pub timeout: Duration,
}

impl VercelBlobConfig {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: VERCEL_BLOB_API.to_string(),
            public_base_url: None,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }
}

#[derive(Deserialize)]
struct PutResponse {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    blobs: Vec<BlobEntry>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

/// Hosted blob store over its REST API
#[derive(Debug, Clone)]
pub struct VercelBlobStore {
    http: reqwest::Client,
    config: VercelBlobConfig,
}

impl VercelBlobStore {
    pub fn new(config: VercelBlobConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let response = self.http.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::status("blob get", status, &body));
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }
}

#[async_trait]
impl BlobStore for VercelBlobStore {
    async fn put(
        &self,
        pathname: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>, StoreError> {
        let response = self
            .http
            .put(format!("{}/{pathname}", self.config.api_url))
            .bearer_auth(&self.config.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::status("blob put", status, &body));
        }
        let put: PutResponse = response.json().await?;
        Ok(Some(put.url))
    }

    async fn get(&self, pathname: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(base) = &self.config.public_base_url {
            return self.fetch(&format!("{base}/{pathname}")).await;
        }
        let entries = self.list(pathname).await?;
        match entries.into_iter().find(|e| e.pathname == pathname) {
            Some(entry) => self.fetch(&entry.url).await,
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StoreError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("prefix", prefix.to_string()), ("limit", "1000".to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let response = self
                .http
                .get(&self.config.api_url)
                .bearer_auth(&self.config.token)
                .query(&query)
                .send()
                .await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::status("blob list", status, &body));
            }
            let page: ListResponse = response.json().await?;
            all.extend(page.blobs);
            match page.cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(all)
    }

    async fn delete(&self, urls: &[String]) -> Result<usize, StoreError> {
        if urls.is_empty() {
            return Ok(0);
        }
        let response = self
            .http
            .post(format!("{}/delete", self.config.api_url))
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "urls": urls }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::status("blob delete", status, &body));
        }
        Ok(urls.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn memory_store_round_trip_and_delete() {
        let store = MemoryBlobStore::new();
        let url = store
            .put("kaleidosite/site_a.html", b"<p>a</p>".to_vec(), "text/html")
            .await
            .unwrap()
            .unwrap();
        store
            .put("kaleidosite/site_a_meta.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store.put("other/x", Vec::new(), "text/plain").await.unwrap();

        assert_eq!(
            store.get("kaleidosite/site_a.html").await.unwrap().as_deref(),
            Some(&b"<p>a</p>"[..])
        );
        let listed = store.list("kaleidosite/").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].size, 8);

        let removed = store
            .delete(&[url, "memory://missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn null_store_skips_everything() {
        let store = NullBlobStore;
        assert!(!store.is_configured());
        assert!(store.put("a", vec![1], "x").await.unwrap().is_none());
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[test]
    fn list_page_decodes() {
        let page: ListResponse = serde_json::from_value(serde_json::json!({
            "blobs": [{
                "url": "https://x.public.blob.vercel-storage.com/kaleidosite/site_a.html",
                "pathname": "kaleidosite/site_a.html",
                "size": 10,
                "uploadedAt": "2024-05-01T10:00:00.000Z"
            }],
            "cursor": "abc",
            "hasMore": true
        }))
        .unwrap();
        assert!(page.has_more);
        assert_eq!(page.blobs[0].pathname, "kaleidosite/site_a.html");
        assert!(page.blobs[0].uploaded_at.is_some());
    }
}
