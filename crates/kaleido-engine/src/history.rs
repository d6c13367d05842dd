//! History of published sites, newest first
//!
//! Stored in the KV store as a JSON array of `[id, timestamp]` pairs. The
//! list is read-modify-write without a concurrency token; last writer wins.

use crate::settings::keys;
use kaleido_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most entries kept
pub const HISTORY_LIMIT: usize = 200;

/// `(id, timestamp_ms)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry(pub String, pub i64);

impl HistoryEntry {
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.1
    }
}

/// Decode whatever is stored, skipping entries of the wrong shape
fn decode(value: Option<Value>) -> Vec<HistoryEntry> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Current history, newest first
///
/// # Errors
/// Fails only when the store does.
pub async fn load(store: &dyn KvStore) -> Result<Vec<HistoryEntry>, StoreError> {
    Ok(decode(store.get(keys::HISTORY).await?))
}

async fn save(store: &dyn KvStore, entries: &[HistoryEntry]) -> Result<(), StoreError> {
    store.set(keys::HISTORY, serde_json::to_value(entries)?).await
}

/// Put `id` at the front, dropping any older entry with the same id
///
/// # Errors
/// Fails when the store does.
pub async fn record(store: &dyn KvStore, id: &str, timestamp: i64) -> Result<Vec<HistoryEntry>, StoreError> {
    let mut entries = load(store).await?;
    entries.retain(|e| e.id() != id);
    entries.insert(0, HistoryEntry(id.to_string(), timestamp));
    entries.truncate(HISTORY_LIMIT);
    save(store, &entries).await?;
    Ok(entries)
}

/// Drop `id` from the history; returns whether anything changed
///
/// # Errors
/// Fails when the store does.
pub async fn remove(store: &dyn KvStore, id: &str) -> Result<bool, StoreError> {
    let mut entries = load(store).await?;
    let before = entries.len();
    entries.retain(|e| e.id() != id);
    if entries.len() == before {
        return Ok(false);
    }
    save(store, &entries).await?;
    Ok(true)
}
