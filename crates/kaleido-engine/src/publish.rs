//! Publishing: generate under the shared lease, persist, track history
//!
//! Layout of the blob store under [`BLOB_PREFIX`]:
//! - `site_{id}.html` and `site_{id}_meta.json` per generated site
//! - `latest.html` and `latest_meta.json` for the most recent one
//!
//! The KV store carries the latest pointers and the history list.

use crate::error::EngineError;
use crate::history::{self, HistoryEntry};
use crate::options::GenerationOptions;
use crate::settings::{keys, Settings};
use crate::strategy::StrategyRouter;
use chrono::{DateTime, Utc};
use kaleido_core::{minify_html, post_process, GenUsage, PostProcessOptions, SiteMeta};
use kaleido_store::{
    with_lease, BlobEntry, BlobStore, KvOp, LeasePolicy, LeaseStore, RateCounter, StoreError,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Folder of every stored object
pub const BLOB_PREFIX: &str = "kaleidosite/";

/// Counter prefix of the per-minute generation budget
pub const RATE_PREFIX: &str = "rate:gen";

const LATEST_HTML: &str = "kaleidosite/latest.html";
const LATEST_META: &str = "kaleidosite/latest_meta.json";

fn html_path(id: &str) -> String {
    format!("{BLOB_PREFIX}site_{id}.html")
}

fn meta_path(id: &str) -> String {
    format!("{BLOB_PREFIX}site_{id}_meta.json")
}

/// Site ids are uuids in practice; anything outside this alphabet is rejected
#[must_use]
pub fn is_valid_site_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A freshly published site
#[derive(Debug, Clone)]
pub struct PublishedSite {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub ts: i64,
    pub usage: GenUsage,
    /// Stored (minified, control-free) document
    pub html: String,
    pub meta: SiteMeta,
}

/// Latest stored document and its id when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestSite {
    pub id: Option<String>,
    pub html: String,
}

/// Latest pointer as kept in the KV store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LatestPointer {
    pub id: Option<String>,
    pub ts: Option<i64>,
}

/// Stored objects of one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteListing {
    pub id: String,
    pub html_url: Option<String>,
    pub meta_url: Option<String>,
    pub images: Vec<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl SiteListing {
    fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            html_url: None,
            meta_url: None,
            images: Vec::new(),
            uploaded_at: None,
        }
    }

    fn urls(&self) -> impl Iterator<Item = &String> {
        self.html_url
            .iter()
            .chain(self.meta_url.iter())
            .chain(self.images.iter())
    }
}

enum BlobKind {
    Html,
    Meta,
    Image,
}

/// Site id and object kind of a stored pathname; `None` for the latest copies
fn classify(pathname: &str) -> Option<(String, BlobKind)> {
    let name = pathname.rsplit('/').next().unwrap_or(pathname);
    if let Some(stem) = name.strip_suffix("_meta.json") {
        return stem.strip_prefix("site_").map(|id| (id.to_string(), BlobKind::Meta));
    }
    if let Some(stem) = name.strip_suffix(".html") {
        return stem.strip_prefix("site_").map(|id| (id.to_string(), BlobKind::Html));
    }
    if let Some(stem) = name.strip_suffix(".png") {
        // {id}-{suffix}.png
        return stem
            .rsplit_once('-')
            .filter(|(id, suffix)| !id.is_empty() && !suffix.is_empty())
            .map(|(id, _)| (id.to_string(), BlobKind::Image));
    }
    None
}

/// Group blob entries by site, newest first
fn group_sites(entries: Vec<BlobEntry>) -> Vec<SiteListing> {
    let mut sites: HashMap<String, SiteListing> = HashMap::new();
    for entry in entries {
        let Some((id, kind)) = classify(&entry.pathname) else {
            continue;
        };
        let site = sites.entry(id).or_insert_with_key(|id| SiteListing::empty(id));
        match kind {
            BlobKind::Html => {
                site.html_url = Some(entry.url);
                site.uploaded_at = entry.uploaded_at;
            }
            BlobKind::Meta => site.meta_url = Some(entry.url),
            BlobKind::Image => site.images.push(entry.url),
        }
    }
    let mut listed: Vec<SiteListing> = sites.into_values().collect();
    listed.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then_with(|| a.id.cmp(&b.id)));
    listed
}

/// Publisher
pub struct Publisher {
    router: Arc<StrategyRouter>,
    blobs: Arc<dyn BlobStore>,
    leases: Arc<dyn LeaseStore>,
    counter: Arc<dyn RateCounter>,
    policy: LeasePolicy,
    options: GenerationOptions,
}

impl Publisher {
    #[must_use]
    pub fn new(
        router: Arc<StrategyRouter>,
        blobs: Arc<dyn BlobStore>,
        leases: Arc<dyn LeaseStore>,
        counter: Arc<dyn RateCounter>,
    ) -> Self {
        Self {
            router,
            blobs,
            leases,
            counter,
            policy: LeasePolicy::default(),
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: LeasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Base options; per-generation settings are layered on top
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.router.settings()
    }

    #[inline]
    #[must_use]
    pub fn router(&self) -> &StrategyRouter {
        &self.router
    }

    /// Options for one stored generation: bare document, runtime settings applied
    async fn options_for(&self, id: &str) -> Result<GenerationOptions, EngineError> {
        let settings = self.settings();
        let mut options = self.options.clone().with_site_id(id).with_controls(false);
        if let Some(model) = settings.model().await? {
            options.render_model = model;
        }
        let include_image = settings.include_image().await?;
        let image_prompt = settings.image_prompt().await?;
        Ok(options.with_image(include_image, image_prompt))
    }

    /// Stored copy of the most recent site
    ///
    /// # Errors
    /// Fails when the blob store does.
    pub async fn latest(&self) -> Result<Option<LatestSite>, EngineError> {
        let Some(bytes) = self.blobs.get(LATEST_HTML).await? else {
            return Ok(None);
        };
        let html = String::from_utf8_lossy(&bytes).into_owned();
        let id = match self.blobs.get(LATEST_META).await {
            Ok(Some(meta)) => serde_json::from_slice::<Value>(&meta)
                .ok()
                .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_owned)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("could not read latest metadata: {e}");
                None
            }
        };
        Ok(Some(LatestSite { id, html }))
    }

    /// Latest site ready to serve, generating one under the lease when nothing is stored
    ///
    /// # Errors
    /// Lease timeouts and generation failures propagate.
    pub async fn serve_latest(&self, embed_controls: bool) -> Result<String, EngineError> {
        let latest = match self.latest().await? {
            Some(latest) => latest,
            None => {
                tracing::info!("no stored site, generating one");
                with_lease(&self.leases, &self.policy, || self.latest_or_generate()).await?
            }
        };
        let options = PostProcessOptions {
            id: latest.id,
            embed_controls,
        };
        Ok(post_process(&latest.html, &options))
    }

    async fn latest_or_generate(&self) -> Result<LatestSite, EngineError> {
        // another instance may have finished while we waited
        if let Some(latest) = self.latest().await? {
            return Ok(latest);
        }
        let site = self.generate_and_store().await?;
        Ok(LatestSite {
            id: Some(site.id),
            html: site.html,
        })
    }

    /// Rate-limited generation under the lease
    ///
    /// # Errors
    /// [`EngineError::RateLimited`] when this minute's budget is spent;
    /// otherwise lease, generation and store failures.
    pub async fn pregenerate(&self) -> Result<PublishedSite, EngineError> {
        with_lease(&self.leases, &self.policy, || async {
            self.check_rate().await?;
            self.generate_and_store().await
        })
        .await
    }

    async fn check_rate(&self) -> Result<(), EngineError> {
        let Some(limit) = self.settings().rate_limit().await? else {
            return Ok(());
        };
        let current = self
            .counter
            .current_minute_count(RATE_PREFIX)
            .await?
            .unwrap_or(0);
        if current >= limit {
            tracing::warn!(limit, current, "generation rate limit reached");
            return Err(EngineError::RateLimited { limit, current });
        }
        self.counter.increment_minute_counter(RATE_PREFIX).await?;
        Ok(())
    }

    /// Generate a new site and persist it as the latest
    ///
    /// Callers are expected to hold the lease.
    ///
    /// # Errors
    /// Generation and store failures propagate.
    pub async fn generate_and_store(&self) -> Result<PublishedSite, EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("generate", id = %id);
        self.publish_new(id).instrument(span).await
    }

    async fn publish_new(&self, id: String) -> Result<PublishedSite, EngineError> {
        let options = self.options_for(&id).await?;
        let strategy = self.router.resolve().await;
        let site = self.router.generate_with(strategy, &id, None, &options).await?;

        let html = minify_html(&site.html);
        let ts = Utc::now().timestamp_millis();
        let meta = SiteMeta {
            id: id.clone(),
            timestamp: ts,
            summary: site.plan.summary.clone(),
            plan: site.plan,
            usage: site.usage.clone(),
            model: Some(options.render_model.clone()),
            strategy: site.strategy.to_string(),
        };
        self.persist(&id, ts, &html, &meta).await?;
        tracing::info!(
            strategy = %site.strategy,
            input_tokens = site.usage.input_tokens,
            output_tokens = site.usage.output_tokens,
            "site published"
        );
        Ok(PublishedSite {
            id,
            ts,
            usage: site.usage,
            html,
            meta,
        })
    }

    async fn persist(&self, id: &str, ts: i64, html: &str, meta: &SiteMeta) -> Result<(), EngineError> {
        let meta_json = serde_json::to_vec_pretty(meta).map_err(StoreError::from)?;
        let html_type = "text/html; charset=utf-8";
        let json_type = "application/json";

        self.blobs.put(&html_path(id), html.as_bytes().to_vec(), html_type).await?;
        self.blobs.put(&meta_path(id), meta_json.clone(), json_type).await?;
        self.blobs.put(LATEST_META, meta_json, json_type).await?;
        self.blobs.put(LATEST_HTML, html.as_bytes().to_vec(), html_type).await?;

        let kv = self.settings().store();
        let meta_value = serde_json::to_value(meta).map_err(StoreError::from)?;
        kv.apply(vec![
            KvOp::upsert(keys::LATEST_ID, id),
            KvOp::upsert(keys::LATEST_TS, ts),
            KvOp::upsert(keys::LATEST_META, meta_value),
        ])
        .await?;
        history::record(kv.as_ref(), id, ts).await?;
        Ok(())
    }

    /// Stored document for `id`, tagged with its id and without controls
    ///
    /// # Errors
    /// Fails when the blob store does.
    pub async fn stored_site(&self, id: &str) -> Result<Option<String>, EngineError> {
        if !is_valid_site_id(id) {
            return Ok(None);
        }
        Ok(self
            .blobs
            .get(&html_path(id))
            .await?
            .map(|bytes| post_process(&String::from_utf8_lossy(&bytes), &PostProcessOptions::bare(id))))
    }

    /// Every stored site grouped by id, newest first
    ///
    /// # Errors
    /// Fails when the blob store does.
    pub async fn list_sites(&self) -> Result<Vec<SiteListing>, EngineError> {
        Ok(group_sites(self.blobs.list(BLOB_PREFIX).await?))
    }

    /// Delete every object of `id` and drop it from the history
    ///
    /// # Errors
    /// Fails when either store does.
    pub async fn delete_site(&self, id: &str) -> Result<usize, EngineError> {
        let urls: Vec<String> = self
            .list_sites()
            .await?
            .into_iter()
            .filter(|site| site.id == id)
            .flat_map(|site| site.urls().cloned().collect::<Vec<_>>())
            .collect();
        let deleted = if urls.is_empty() {
            0
        } else {
            self.blobs.delete(&urls).await?
        };
        history::remove(self.settings().store().as_ref(), id).await?;
        tracing::info!(id, deleted, "site deleted");
        Ok(deleted)
    }

    /// Latest pointer from the KV store
    ///
    /// # Errors
    /// Fails when the KV store does.
    pub async fn status(&self) -> Result<LatestPointer, EngineError> {
        let kv = self.settings().store();
        let id = kv
            .get(keys::LATEST_ID)
            .await?
            .and_then(|v| v.as_str().map(str::to_owned));
        let ts = kv.get(keys::LATEST_TS).await?.and_then(|v| v.as_i64());
        Ok(LatestPointer { id, ts })
    }

    /// Published history, newest first
    ///
    /// # Errors
    /// Fails when the KV store does.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, EngineError> {
        Ok(history::load(self.settings().store().as_ref()).await?)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("router", &self.router)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pathname: &str, minute: u32) -> BlobEntry {
        BlobEntry {
            url: format!("memory://{pathname}"),
            pathname: pathname.to_string(),
            uploaded_at: DateTime::parse_from_rfc3339(&format!("2026-01-01T00:{minute:02}:00Z"))
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            size: 1,
        }
    }

    #[test]
    fn site_ids_are_restricted() {
        assert!(is_valid_site_id("0b7e2c1a-94f1-4a53-9c1e-8d8d3c3f0a11"));
        assert!(is_valid_site_id("abc_123"));
        assert!(!is_valid_site_id(""));
        assert!(!is_valid_site_id("../etc/passwd"));
        assert!(!is_valid_site_id("a b"));
    }

    #[test]
    fn classifies_stored_objects() {
        assert!(matches!(classify("kaleidosite/site_abc.html"), Some((id, BlobKind::Html)) if id == "abc"));
        assert!(matches!(classify("kaleidosite/site_abc_meta.json"), Some((id, BlobKind::Meta)) if id == "abc"));
        assert!(matches!(classify("kaleidosite/abc-x1.png"), Some((id, BlobKind::Image)) if id == "abc"));
        assert!(classify("kaleidosite/latest.html").is_none());
        assert!(classify("kaleidosite/latest_meta.json").is_none());
    }

    #[test]
    fn groups_by_site_newest_first() {
        let sites = group_sites(vec![
            entry("kaleidosite/site_old.html", 1),
            entry("kaleidosite/site_old_meta.json", 1),
            entry("kaleidosite/site_new.html", 5),
            entry("kaleidosite/new-a1.png", 5),
            entry("kaleidosite/latest.html", 5),
        ]);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].id, "new");
        assert_eq!(sites[0].images, vec!["memory://kaleidosite/new-a1.png"]);
        assert_eq!(sites[1].id, "old");
        assert_eq!(sites[1].meta_url.as_deref(), Some("memory://kaleidosite/site_old_meta.json"));
        assert_eq!(sites[1].urls().count(), 2);
    }
}
