//! Publisher Tests
//!
//! Lease, rate limit, persistence and history over in-memory stores.

use kaleido_engine::{EngineError, Publisher, Settings, StrategyRouter, HISTORY_LIMIT};
use kaleido_llm::NoImageModel;
use kaleido_store::{
    BlobStore, LeasePolicy, LeaseStore, MemoryBlobStore, MemoryKvStore, MemoryLeaseStore,
    NullBlobStore,
};
use kaleido_test_utils::{sample_plan_json, section_index, ScriptedTextModel};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    publisher: Publisher,
    model: Arc<ScriptedTextModel>,
    blobs: Arc<MemoryBlobStore>,
    leases: Arc<MemoryLeaseStore>,
    settings: Settings,
}

fn harness() -> Harness {
    let model = Arc::new(ScriptedTextModel::new(|request| match section_index(request) {
        Some(i) => Ok(format!("<p>part {i}</p>")),
        None => Ok(sample_plan_json().to_string()),
    }));
    let settings = Settings::new(Arc::new(MemoryKvStore::new()));
    let router = Arc::new(StrategyRouter::with_defaults(
        model.clone(),
        Arc::new(NoImageModel),
        settings.clone(),
    ));
    let blobs = Arc::new(MemoryBlobStore::new());
    let leases = Arc::new(MemoryLeaseStore::new());
    let publisher = Publisher::new(router, blobs.clone(), leases.clone(), leases.clone());
    Harness {
        publisher,
        model,
        blobs,
        leases,
        settings,
    }
}

#[tokio::test]
async fn test_pregen_stores_site_and_updates_pointers() {
    let h = harness();
    let site = h.publisher.pregenerate().await.unwrap();

    let stored = h
        .blobs
        .get(&format!("kaleidosite/site_{}.html", site.id))
        .await
        .unwrap()
        .expect("site html stored");
    assert_eq!(String::from_utf8(stored).unwrap(), site.html);
    assert!(h.blobs.get("kaleidosite/latest.html").await.unwrap().is_some());
    assert!(h
        .blobs
        .get(&format!("kaleidosite/site_{}_meta.json", site.id))
        .await
        .unwrap()
        .is_some());
    assert_eq!(h.blobs.len(), 4);

    assert!(!site.html.contains("kaleidosite-controls-script"));
    assert!(!site.html.contains("<!--"));
    assert_eq!(site.meta.strategy, "design-system");
    assert_eq!(site.meta.summary, site.meta.plan.summary);

    let status = h.publisher.status().await.unwrap();
    assert_eq!(status.id.as_deref(), Some(site.id.as_str()));
    assert_eq!(status.ts, Some(site.ts));

    let history = h.publisher.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), site.id);
}

#[tokio::test]
async fn test_pregen_uses_runtime_model_for_sections() {
    let h = harness();
    h.settings.set_model("gpt-4o").await.unwrap();
    let site = h.publisher.pregenerate().await.unwrap();

    let calls = h.model.calls();
    assert_eq!(calls[0].model, "gpt-4o-mini");
    assert!(calls[1..].iter().all(|c| c.model == "gpt-4o"));
    assert_eq!(site.meta.model.as_deref(), Some("gpt-4o"));
}

#[tokio::test]
async fn test_rate_limit_rejects_once_budget_is_spent() {
    let h = harness();
    h.settings.set_rate_limit(&json!(1)).await.unwrap();

    h.publisher.pregenerate().await.unwrap();
    let err = h.publisher.pregenerate().await.unwrap_err();
    assert!(matches!(err, EngineError::RateLimited { limit: 1, current: 1 }));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_held_lease_times_out_the_waiter() {
    let h = harness();
    let holder = h
        .leases
        .acquire("lock:pregen", Duration::from_secs(600))
        .await
        .unwrap()
        .expect("first acquire succeeds");

    let publisher = h.publisher.with_policy(
        LeasePolicy::default()
            .with_wait(Duration::from_secs(5))
            .with_poll(Duration::from_millis(500)),
    );
    let err = publisher.pregenerate().await.unwrap_err();
    assert!(err.is_lease_timeout());
    assert!(h.model.calls().is_empty());

    assert!(h.leases.release(&holder).await.unwrap());
}

#[tokio::test]
async fn test_cold_root_generates_once_then_serves_stored_copy() {
    let h = harness();
    let first = h.publisher.serve_latest(true).await.unwrap();
    let calls_after_first = h.model.calls().len();
    assert!(first.contains("kaleidosite-controls-script"));
    assert!(first.contains("href=\"/site/"));

    let second = h.publisher.serve_latest(true).await.unwrap();
    assert_eq!(h.model.calls().len(), calls_after_first);
    assert_eq!(first, second);

    let raw = h.publisher.serve_latest(false).await.unwrap();
    assert!(!raw.contains("kaleidosite-controls-script"));
    assert_eq!(h.publisher.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stored_site_lookup_and_delete() {
    let h = harness();
    let a = h.publisher.pregenerate().await.unwrap();
    let b = h.publisher.pregenerate().await.unwrap();

    let page = h.publisher.stored_site(&a.id).await.unwrap().expect("stored");
    assert!(page.contains(&a.id));
    assert!(h.publisher.stored_site("../latest").await.unwrap().is_none());
    assert!(h.publisher.stored_site("missing").await.unwrap().is_none());

    let listed = h.publisher.list_sites().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.html_url.is_some() && s.meta_url.is_some()));

    let deleted = h.publisher.delete_site(&a.id).await.unwrap();
    assert_eq!(deleted, 2);
    let remaining: Vec<String> = h
        .publisher
        .list_sites()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec![b.id.clone()]);
    let history = h.publisher.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), b.id);

    assert_eq!(h.publisher.delete_site(&a.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unconfigured_blob_store_still_serves() {
    let model = Arc::new(ScriptedTextModel::new(|request| match section_index(request) {
        Some(i) => Ok(format!("<p>{i}</p>")),
        None => Ok(sample_plan_json().to_string()),
    }));
    let settings = Settings::new(Arc::new(MemoryKvStore::new()));
    let router = Arc::new(StrategyRouter::with_defaults(model, Arc::new(NoImageModel), settings));
    let leases = Arc::new(MemoryLeaseStore::new());
    let publisher = Publisher::new(router, Arc::new(NullBlobStore), leases.clone(), leases);

    let html = publisher.serve_latest(true).await.unwrap();
    assert!(html.contains("<p>0</p>"));
    assert!(publisher.list_sites().await.unwrap().is_empty());
    assert!(HISTORY_LIMIT >= publisher.history().await.unwrap().len());
}
