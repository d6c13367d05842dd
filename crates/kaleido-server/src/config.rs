//! Application configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Runtime settings editable through the admin API live in the
//! KV store instead; see [`kaleido_engine::Settings`].

use kaleido_store::LeasePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration load failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Model provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Default section model
    pub model: String,
    /// Retried once when a call fails
    pub fallback_model: Option<String>,
    pub image_model: Option<String>,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: kaleido_engine::DEFAULT_PLAN_MODEL.to_string(),
            fallback_model: Some("gpt-4o-mini".to_string()),
            image_model: None,
        }
    }
}

/// Blob store credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobSection {
    pub token: Option<String>,
    /// Public base URL of the store
    pub public_url: Option<String>,
}

/// Hosted KV store credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfigSection {
    pub config_id: Option<String>,
    pub read_token: Option<String>,
    /// Write token for the management API
    pub api_token: Option<String>,
}

/// Timing of the generation lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseSection {
    pub ttl_secs: u64,
    pub wait_secs: u64,
    pub poll_ms: u64,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            ttl_secs: 120,
            wait_secs: 115,
            poll_ms: 1500,
        }
    }
}

/// Kaleido configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address
    pub bind: String,
    /// Directory of the local KV fallback file
    pub data_dir: PathBuf,
    /// Required for admin routes when set
    pub admin_token: Option<String>,
    pub redis_url: Option<String>,
    pub openai: OpenAiSection,
    pub blob: BlobSection,
    pub edge_config: EdgeConfigSection,
    pub lease: LeaseSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from(".data"),
            admin_token: None,
            redis_url: None,
            openai: OpenAiSection::default(),
            blob: BlobSection::default(),
            edge_config: EdgeConfigSection::default(),
            lease: LeaseSection::default(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read an optional file, then apply the process environment
    ///
    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    /// Override fields from environment variables read through `lookup`
    ///
    /// Blank values are ignored.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));
        let first = |keys: &[&str]| keys.iter().find_map(|key| get(key));

        if let Some(v) = get("KALEIDO_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("KALEIDO_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ADMIN_TOKEN") {
            self.admin_token = Some(v);
        }
        if let Some(v) = get("REDIS_URL") {
            self.redis_url = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.openai.model = v;
        }
        if let Some(v) = get("OPENAI_FALLBACK_MODEL") {
            self.openai.fallback_model = Some(v);
        }
        if let Some(v) = get("OPENAI_IMAGE_MODEL") {
            self.openai.image_model = Some(v);
        }
        if let Some(v) = first(&["BLOB_READ_WRITE_TOKEN", "VERCEL_BLOB_READ_WRITE_TOKEN", "BLOB_TOKEN"]) {
            self.blob.token = Some(v);
        }
        if let Some(v) = get("BLOB_URL") {
            self.blob.public_url = Some(v);
        }
        if let Some(v) = get("EDGE_CONFIG_ID") {
            self.edge_config.config_id = Some(v);
        }
        if let Some(v) = get("EDGE_CONFIG_TOKEN") {
            self.edge_config.read_token = Some(v);
        }
        if let Some(v) = get("VERCEL_API_TOKEN") {
            self.edge_config.api_token = Some(v);
        }
        self
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// With admin token
    #[inline]
    #[must_use]
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = non_blank(Some(token.into()));
        self
    }

    /// With model API key
    #[inline]
    #[must_use]
    pub fn with_openai_key(mut self, key: impl Into<String>) -> Self {
        self.openai.api_key = non_blank(Some(key.into()));
        self
    }

    /// Lease timing for the generation critical section
    #[must_use]
    pub fn lease_policy(&self) -> LeasePolicy {
        LeasePolicy::default()
            .with_ttl(Duration::from_secs(self.lease.ttl_secs))
            .with_wait(Duration::from_secs(self.lease.wait_secs))
            .with_poll(Duration::from_millis(self.lease.poll_ms))
    }
}
