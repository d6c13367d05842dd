//! Key-value configuration store
//!
//! Holds runtime settings, the latest-site pointers and the history list.
//! [`LayeredKvStore`] reads the hosted store first and falls back to a local
//! JSON file, so a missing or failing remote never blocks the pipeline.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One write in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum KvOp {
    Upsert { key: String, value: Value },
    Delete { key: String },
}

impl KvOp {
    #[must_use]
    pub fn upsert(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Upsert {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// JSON values addressed by string keys
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read one key; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Apply a batch of writes in order
    async fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError>;

    /// Upsert a single key
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.apply(vec![KvOp::upsert(key, value)]).await
    }
}

fn apply_to_map(map: &mut Map<String, Value>, ops: Vec<KvOp>) {
    for op in ops {
        match op {
            KvOp::Upsert { key, value } => {
                map.insert(key, value);
            }
            KvOp::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: RwLock<Map<String, Value>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        apply_to_map(&mut self.values.write(), ops);
        Ok(())
    }
}

/// Default file name inside the data directory
pub const LOCAL_STORE_FILE: &str = "edge.json";

/// Single JSON object on disk
///
/// A missing or unreadable file reads as empty. Writes within one process
/// are serialised.
#[derive(Debug)]
pub struct LocalFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl LocalFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store at `{data_dir}/edge.json`
    #[must_use]
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(LOCAL_STORE_FILE))
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Map<String, Value> {
        let Ok(bytes) = tokio::fs::read(&self.path).await else {
            return Map::new();
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "local store is not a JSON object, treating as empty");
                Map::new()
            }
        }
    }
}

#[async_trait]
impl KvStore for LocalFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all().await.remove(key))
    }

    async fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await;
        apply_to_map(&mut map, ops);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec(&Value::Object(map))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Read endpoint of the hosted config store
pub const EDGE_CONFIG_READ_API: &str = "https://edge-config.vercel.com";
/// Management endpoint of the hosted config store
pub const EDGE_CONFIG_WRITE_API: &str = "https://api.vercel.com/v1/edge-config";

/// Connection settings for [`EdgeConfigStore`]
#[derive(Debug, Clone)]
pub struct EdgeConfigSettings {
    pub config_id: String,
    /// Token for item reads
    pub read_token: Option<String>,
    /// Management token; writes are unavailable without it
    pub api_token: Option<String>,
    pub read_api: String,
    pub write_api: String,
    pub timeout: Duration,
}

impl EdgeConfigSettings {
    #[must_use]
    pub fn new(config_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            read_token: None,
            api_token: None,
            read_api: EDGE_CONFIG_READ_API.to_string(),
            write_api: EDGE_CONFIG_WRITE_API.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_read_token(mut self, token: impl Into<String>) -> Self {
        self.read_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, read_api: impl Into<String>, write_api: impl Into<String>) -> Self {
        self.read_api = read_api.into().trim_end_matches('/').to_string();
        self.write_api = write_api.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct WireItem<'a> {
    operation: &'static str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a Value>,
}

/// Hosted key-value config store
#[derive(Debug, Clone)]
pub struct EdgeConfigStore {
    http: reqwest::Client,
    settings: EdgeConfigSettings,
}

impl EdgeConfigStore {
    pub fn new(settings: EdgeConfigSettings) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, settings })
    }
}

#[async_trait]
impl KvStore for EdgeConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let token = self
            .settings
            .read_token
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("edge config read token".into()))?;
        let url = format!(
            "{}/{}/item/{key}",
            self.settings.read_api, self.settings.config_id
        );
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::status("edge config read", status, &body));
        }
        let value: Value = response.json().await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        let token = self
            .settings
            .api_token
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("edge config api token".into()))?;
        let items: Vec<WireItem<'_>> = ops
            .iter()
            .map(|op| match op {
                KvOp::Upsert { key, value } => WireItem {
                    operation: "upsert",
                    key,
                    value: Some(value),
                },
                KvOp::Delete { key } => WireItem {
                    operation: "delete",
                    key,
                    value: None,
                },
            })
            .collect();
        let url = format!("{}/{}/items", self.settings.write_api, self.settings.config_id);
        let response = self
            .http
            .patch(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "items": items }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::status("edge config write", status, &body));
        }
        Ok(())
    }
}

/// Remote store with a local fallback
///
/// Reads try the remote first and use the local copy when the remote fails
/// or has no value. Writes go to the remote and land locally if that fails.
#[derive(Clone)]
pub struct LayeredKvStore {
    remote: Option<Arc<dyn KvStore>>,
    local: Arc<dyn KvStore>,
}

impl LayeredKvStore {
    #[must_use]
    pub fn new(remote: Option<Arc<dyn KvStore>>, local: Arc<dyn KvStore>) -> Self {
        Self { remote, local }
    }

    /// Store with no remote at all
    #[must_use]
    pub fn local_only(local: Arc<dyn KvStore>) -> Self {
        Self::new(None, local)
    }
}

impl std::fmt::Debug for LayeredKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredKvStore")
            .field("remote", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KvStore for LayeredKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => tracing::debug!(key, "remote kv read failed, using local: {e}"),
            }
        }
        self.local.get(key).await
    }

    async fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        if let Some(remote) = &self.remote {
            match remote.apply(ops.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(
                    keys = ?ops.iter().map(KvOp::key).collect::<Vec<_>>(),
                    "remote kv write failed, writing locally: {e}"
                ),
            }
        }
        self.local.apply(ops).await
    }
}
