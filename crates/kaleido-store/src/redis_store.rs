//! Redis-backed leases and counters
//!
//! - acquire: `SET key token NX PX ttl`
//! - release: compare-and-delete script keyed on the token
//! - counters: `INCR` plus `EXPIRE` on the first increment of a minute

use crate::error::StoreError;
use crate::lease::{current_minute_key, Lease, LeaseStore, RateCounter, COUNTER_EXPIRY};
use async_trait::async_trait;
use std::time::Duration;

const RELEASE_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
  return redis.call('del', KEYS[1])
else
  return 0
end
";

/// Lease store and counter on a Redis-compatible server
#[derive(Clone)]
pub struct RedisLeaseStore {
    client: redis::Client,
    release_script: std::sync::Arc<redis::Script>,
}

impl std::fmt::Debug for RedisLeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLeaseStore").finish_non_exhaustive()
    }
}

impl RedisLeaseStore {
    /// Open a client for `url`; no connection is made until first use
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            release_script: std::sync::Arc::new(redis::Script::new(RELEASE_SCRIPT)),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, StoreError> {
        let mut conn = self.connection().await?;
        let lease = Lease::generate(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(lease.token())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(reply.map(|_| lease))
    }

    async fn release(&self, lease: &Lease) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = self
            .release_script
            .key(lease.key())
            .arg(lease.token())
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl RateCounter for RedisLeaseStore {
    async fn increment_minute_counter(&self, prefix: &str) -> Result<Option<u64>, StoreError> {
        let key = current_minute_key(prefix);
        let mut conn = self.connection().await?;
        let count: u64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(COUNTER_EXPIRY.as_secs())
                .query_async(&mut conn)
                .await?;
        }
        Ok(Some(count))
    }

    async fn current_minute_count(&self, prefix: &str) -> Result<Option<u64>, StoreError> {
        let key = current_minute_key(prefix);
        let mut conn = self.connection().await?;
        let count: Option<u64> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        Ok(Some(count.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected() {
        assert!(RedisLeaseStore::open("not a url").is_err());
        assert!(RedisLeaseStore::open("redis://127.0.0.1:6379").is_ok());
    }
}
