//! Capability wiring
//!
//! Every optional service falls back to its null implementation when its
//! credentials are missing, so the server always starts.

use crate::config::AppConfig;
use kaleido_engine::{GenerationOptions, Publisher, Settings, StrategyRouter, DEFAULT_PLAN_MODEL};
use kaleido_llm::{
    FallbackTextModel, ImageModel, LlmError, NoImageModel, OpenAiClient, OpenAiConfig, TextModel,
    UnconfiguredTextModel,
};
use kaleido_store::{
    BlobStore, EdgeConfigSettings, EdgeConfigStore, KvStore, LayeredKvStore, LeaseStore,
    LocalFileStore, NoopLeaseStore, NullBlobStore, RateCounter, RedisLeaseStore, StoreError,
    VercelBlobConfig, VercelBlobStore,
};
use std::sync::Arc;

/// Startup failure
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("model client: {0}")]
    Llm(#[from] LlmError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
    admin_token: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(publisher: Arc<Publisher>, admin_token: Option<String>) -> Self {
        Self {
            publisher,
            admin_token: admin_token.filter(|t| !t.is_empty()),
        }
    }

    /// Build every capability from `config`
    ///
    /// # Errors
    /// Fails only when configured credentials produce an unusable client.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let (text, images) = models(config)?;
        let kv = kv_store(config)?;
        let settings = Settings::new(kv).with_default_model(config.openai.model.clone());
        let router = Arc::new(StrategyRouter::with_defaults(text, images, settings));

        let (leases, counter) = lease_store(config)?;
        let options = GenerationOptions::new()
            .with_plan_model(DEFAULT_PLAN_MODEL)
            .with_render_model(config.openai.model.clone());
        let publisher = Publisher::new(router, blob_store(config)?, leases, counter)
            .with_policy(config.lease_policy())
            .with_options(options);

        Ok(Self::new(Arc::new(publisher), config.admin_token.clone()))
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.publisher.settings()
    }

    /// Whether a request carrying `token` may use admin routes
    ///
    /// Without a configured token every request is allowed.
    #[must_use]
    pub fn is_admin(&self, token: Option<&str>) -> bool {
        match &self.admin_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("publisher", &self.publisher)
            .field("admin", &self.admin_token.is_some())
            .finish()
    }
}

fn models(config: &AppConfig) -> Result<(Arc<dyn TextModel>, Arc<dyn ImageModel>), AppError> {
    let Some(key) = &config.openai.api_key else {
        tracing::warn!("OPENAI_API_KEY not set, generation requests will fail");
        let text: Arc<dyn TextModel> = Arc::new(UnconfiguredTextModel);
        let images: Arc<dyn ImageModel> = Arc::new(NoImageModel);
        return Ok((text, images));
    };

    let mut openai = OpenAiConfig::new(key.clone());
    if let Some(url) = &config.openai.base_url {
        openai = openai.with_base_url(url.clone());
    }
    if let Some(model) = &config.openai.image_model {
        openai = openai.with_image_model(model.clone());
    }
    let client = Arc::new(OpenAiClient::new(openai)?);

    let text: Arc<dyn TextModel> = match &config.openai.fallback_model {
        Some(fallback) => Arc::new(FallbackTextModel::new(client.clone(), fallback.clone())),
        None => client.clone(),
    };
    let images: Arc<dyn ImageModel> = client;
    Ok((text, images))
}

fn blob_store(config: &AppConfig) -> Result<Arc<dyn BlobStore>, AppError> {
    let Some(token) = &config.blob.token else {
        tracing::warn!("blob token not set, generated sites will not be stored");
        return Ok(Arc::new(NullBlobStore));
    };
    let mut blob = VercelBlobConfig::new(token.clone());
    if let Some(url) = &config.blob.public_url {
        blob = blob.with_public_base_url(url.clone());
    }
    Ok(Arc::new(VercelBlobStore::new(blob)?))
}

fn kv_store(config: &AppConfig) -> Result<Arc<dyn KvStore>, AppError> {
    let local: Arc<dyn KvStore> = Arc::new(LocalFileStore::in_dir(&config.data_dir));
    let Some(id) = &config.edge_config.config_id else {
        tracing::info!(dir = %config.data_dir.display(), "using local settings store");
        return Ok(Arc::new(LayeredKvStore::local_only(local)));
    };
    let mut edge = EdgeConfigSettings::new(id.clone());
    if let Some(token) = &config.edge_config.read_token {
        edge = edge.with_read_token(token.clone());
    }
    if let Some(token) = &config.edge_config.api_token {
        edge = edge.with_api_token(token.clone());
    }
    let remote: Arc<dyn KvStore> = Arc::new(EdgeConfigStore::new(edge)?);
    Ok(Arc::new(LayeredKvStore::new(Some(remote), local)))
}

fn lease_store(config: &AppConfig) -> Result<(Arc<dyn LeaseStore>, Arc<dyn RateCounter>), AppError> {
    match &config.redis_url {
        Some(url) => {
            let redis = Arc::new(RedisLeaseStore::open(url)?);
            let leases: Arc<dyn LeaseStore> = redis.clone();
            let counter: Arc<dyn RateCounter> = redis;
            Ok((leases, counter))
        }
        None => {
            tracing::warn!("REDIS_URL not set, generation is not coordinated across instances");
            let leases: Arc<dyn LeaseStore> = Arc::new(NoopLeaseStore);
            let counter: Arc<dyn RateCounter> = Arc::new(NoopLeaseStore);
            Ok((leases, counter))
        }
    }
}
