//! Expiring leases and per-minute counters
//!
//! A lease is an exclusive, time-bounded claim on a key. The holder gets an
//! opaque token and only that token can release it; expiry is enforced by
//! the store, so a crashed holder never blocks others for longer than the TTL.
//!
//! [`with_lease`] runs a critical section under a lease, polling until the
//! lease is granted or the wait budget runs out.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Counter keys expire this long after their first increment
pub const COUNTER_EXPIRY: Duration = Duration::from_secs(70);

/// Granted lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    key: String,
    token: String,
}

impl Lease {
    /// Create a lease with a fresh random token
    #[must_use]
    pub fn generate(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Store that grants exclusive expiring leases
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Try once to take `key` for `ttl`; `None` when someone else holds it
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, StoreError>;

    /// Release a lease; `false` when it expired or belongs to someone else
    async fn release(&self, lease: &Lease) -> Result<bool, StoreError>;
}

/// Per-minute counters for rate limiting
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Increment the counter of the current minute; `None` when not tracked
    async fn increment_minute_counter(&self, prefix: &str) -> Result<Option<u64>, StoreError>;

    /// Value of the counter of the current minute; `None` when not tracked
    async fn current_minute_count(&self, prefix: &str) -> Result<Option<u64>, StoreError>;
}

/// Counter key for the minute containing `now_ms`
#[must_use]
pub fn minute_key(prefix: &str, now_ms: i64) -> String {
    format!("{prefix}:{}", now_ms.div_euclid(60_000))
}

/// Counter key for the current minute
#[must_use]
pub fn current_minute_key(prefix: &str) -> String {
    minute_key(prefix, chrono::Utc::now().timestamp_millis())
}

/// Lease store used when no coordination store is configured
///
/// Grants every request and tracks no counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLeaseStore;

#[async_trait]
impl LeaseStore for NoopLeaseStore {
    async fn acquire(&self, key: &str, _ttl: Duration) -> Result<Option<Lease>, StoreError> {
        Ok(Some(Lease::generate(key)))
    }

    async fn release(&self, _lease: &Lease) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[async_trait]
impl RateCounter for NoopLeaseStore {
    async fn increment_minute_counter(&self, _prefix: &str) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    async fn current_minute_count(&self, _prefix: &str) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    leases: HashMap<String, (String, Instant)>,
    counters: HashMap<String, (u64, Instant)>,
}

/// In-process lease store and counter
///
/// Deadlines use the tokio clock so paused-time tests can drive expiry.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    state: Mutex<MemoryState>,
}

impl MemoryLeaseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if let Some((_, deadline)) = state.leases.get(key) {
            if *deadline > now {
                return Ok(None);
            }
        }
        let lease = Lease::generate(key);
        state
            .leases
            .insert(key.to_string(), (lease.token.clone(), now + ttl));
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let owned = state
            .leases
            .get(&lease.key)
            .is_some_and(|(token, deadline)| *token == lease.token && *deadline > now);
        if owned {
            state.leases.remove(&lease.key);
        }
        Ok(owned)
    }
}

#[async_trait]
impl RateCounter for MemoryLeaseStore {
    async fn increment_minute_counter(&self, prefix: &str) -> Result<Option<u64>, StoreError> {
        let key = current_minute_key(prefix);
        let now = Instant::now();
        let mut state = self.state.lock();
        state.counters.retain(|_, (_, deadline)| *deadline > now);
        let entry = state
            .counters
            .entry(key)
            .or_insert((0, now + COUNTER_EXPIRY));
        entry.0 += 1;
        Ok(Some(entry.0))
    }

    async fn current_minute_count(&self, prefix: &str) -> Result<Option<u64>, StoreError> {
        let key = current_minute_key(prefix);
        let now = Instant::now();
        let state = self.state.lock();
        Ok(Some(
            state
                .counters
                .get(&key)
                .filter(|(_, deadline)| *deadline > now)
                .map_or(0, |(count, _)| *count),
        ))
    }
}

/// Timing of a [`with_lease`] critical section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasePolicy {
    pub key: String,
    /// How long a granted lease lives
    pub ttl: Duration,
    /// How long to keep trying before giving up
    pub wait: Duration,
    /// Delay between attempts
    pub poll: Duration,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            key: "lock:pregen".to_string(),
            ttl: Duration::from_secs(120),
            wait: Duration::from_secs(115),
            poll: Duration::from_millis(1500),
        }
    }
}

impl LeasePolicy {
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

/// Failure to run a critical section
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// Lease not granted within the wait budget
    #[error("timed out after {waited_ms}ms waiting for lease {key}")]
    Timeout { key: String, waited_ms: u64 },

    /// Store failed while acquiring
    #[error("lease store error: {0}")]
    Store(#[from] StoreError),
}

/// Lease held across a critical section
///
/// A guard dropped before [`LeaseGuard::release`] completes spawns the release
/// on the current runtime.
struct LeaseGuard {
    store: Arc<dyn LeaseStore>,
    lease: Option<Lease>,
}

impl LeaseGuard {
    async fn release(mut self) {
        if let Some(lease) = &self.lease {
            log_release(lease.key(), self.store.release(lease).await);
        }
        self.lease = None;
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                tracing::debug!(key = %lease.key(), "critical section dropped, releasing in background");
                handle.spawn(async move {
                    log_release(lease.key(), store.release(&lease).await);
                });
            }
            Err(_) => tracing::warn!(key = %lease.key(), "no runtime to release dropped lease, it will expire"),
        }
    }
}

fn log_release(key: &str, result: Result<bool, StoreError>) {
    match result {
        Ok(true) => tracing::debug!(key, "lease released"),
        Ok(false) => tracing::warn!(key, "lease had already expired on release"),
        Err(e) => tracing::warn!(key, "lease release failed: {e}"),
    }
}

/// Run `work` while holding the lease described by `policy`
///
/// The lease is released after `work` finishes, whether it succeeded or not,
/// and also when the returned future is dropped before that.
/// Errors of `work` pass through unchanged.
pub async fn with_lease<T, E, F, Fut>(
    store: &Arc<dyn LeaseStore>,
    policy: &LeasePolicy,
    work: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LeaseError>,
{
    let start = Instant::now();
    let lease = loop {
        match store
            .acquire(&policy.key, policy.ttl)
            .await
            .map_err(LeaseError::from)?
        {
            Some(lease) => break lease,
            None => {
                let waited = start.elapsed();
                if waited > policy.wait {
                    return Err(LeaseError::Timeout {
                        key: policy.key.clone(),
                        waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    }
                    .into());
                }
                tracing::debug!(key = %policy.key, "lease busy, retrying");
                tokio::time::sleep(policy.poll).await;
            }
        }
    };

    tracing::debug!(key = %policy.key, "lease acquired");
    let guard = LeaseGuard {
        store: Arc::clone(store),
        lease: Some(lease),
    };
    let result = work().await;
    guard.release().await;
    result
}
