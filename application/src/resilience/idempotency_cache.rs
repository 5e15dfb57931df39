//! Idempotency cache: successful results keyed per tool.
//!
//! Eviction is time-based (entries older than the TTL are dropped when read
//! or when the shard is written) with a per-tool capacity backstop that
//! evicts the oldest `stored_at` entry. Only successes are stored.
//!
//! [`IdempotencyCache::claim`] serializes concurrent calls that share a key,
//! so a burst of identical calls invokes the worker once.

use super::shards::{PerToolShards, lock};
use crate::config::IdempotencyConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;
use toolscript_domain::{IdempotencyEntry, IdempotencyKey};

type KeyLocks = HashMap<IdempotencyKey, Arc<tokio::sync::Mutex<()>>>;

pub struct IdempotencyCache {
    config: IdempotencyConfig,
    entries: PerToolShards<HashMap<IdempotencyKey, IdempotencyEntry>>,
    in_flight: PerToolShards<KeyLocks>,
}

impl IdempotencyCache {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            config,
            entries: PerToolShards::new(),
            in_flight: PerToolShards::new(),
        }
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Cached result, if present and not expired
    pub fn get(&self, tool: &str, key: &IdempotencyKey) -> Option<Value> {
        let shard = self.entries.get(tool)?;
        let mut entries = lock(&shard);
        let now = now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(self.config.ttl, now) => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                debug!("Idempotency entry for {} expired", tool);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, tool: &str, key: IdempotencyKey, result: Value) {
        if self.config.capacity_per_tool == 0 {
            return;
        }
        let shard = self.entries.shard(tool);
        let mut entries = lock(&shard);
        let now = now();
        let ttl = self.config.ttl;
        entries.retain(|_, entry| !entry.is_expired(ttl, now));

        while entries.len() >= self.config.capacity_per_tool && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    entries.remove(&oldest);
                }
                None => break,
            }
        }
        entries.insert(key, IdempotencyEntry::new(result, now));
    }

    /// Number of live entries for `tool`
    pub fn len(&self, tool: &str) -> usize {
        let Some(shard) = self.entries.get(tool) else {
            return 0;
        };
        let now = now();
        lock(&shard)
            .values()
            .filter(|entry| !entry.is_expired(self.config.ttl, now))
            .count()
    }

    /// Wait for exclusive use of `key`. Hold the returned claim until the
    /// result is stored (or the call failed).
    pub async fn claim(&self, tool: &str, key: &IdempotencyKey) -> KeyClaim<'_> {
        let key_lock = {
            let shard = self.in_flight.shard(tool);
            let mut locks = lock(&shard);
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = key_lock.clone().lock_owned().await;
        KeyClaim {
            cache: self,
            tool: tool.to_string(),
            key: key.clone(),
            key_lock,
            _guard: Some(guard),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Exclusive claim on one idempotency key
pub struct KeyClaim<'a> {
    cache: &'a IdempotencyCache,
    tool: String,
    key: IdempotencyKey,
    key_lock: Arc<tokio::sync::Mutex<()>>,
    _guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for KeyClaim<'_> {
    fn drop(&mut self) {
        self._guard.take();
        // Remove the lock entry once nobody else holds or waits on it
        if let Some(shard) = self.cache.in_flight.get(&self.tool) {
            let mut locks = lock(&shard);
            if Arc::strong_count(&self.key_lock) <= 2 {
                locks.remove(&self.key);
            }
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn cache(capacity: usize) -> IdempotencyCache {
        IdempotencyCache::new(IdempotencyConfig {
            ttl: Duration::from_secs(60),
            capacity_per_tool: capacity,
            derive_keys: true,
        })
    }

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::explicit(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_get_and_expiry() {
        let cache = cache(8);
        cache.put("t", key("a"), json!({"ok": true}));
        assert_eq!(cache.get("t", &key("a")), Some(json!({"ok": true})));
        assert_eq!(cache.get("other", &key("a")), None);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("t", &key("a")), None);
        assert_eq!(cache.len("t"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = cache(2);
        cache.put("t", key("a"), json!(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put("t", key("b"), json!(2));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put("t", key("c"), json!(3));

        assert_eq!(cache.len("t"), 2);
        assert_eq!(cache.get("t", &key("a")), None);
        assert_eq!(cache.get("t", &key("c")), Some(json!(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        cache.put("t", key("a"), json!(1));
        cache.put("t", key("b"), json!(2));
        cache.put("t", key("b"), json!(3));
        assert_eq!(cache.get("t", &key("a")), Some(json!(1)));
        assert_eq!(cache.get("t", &key("b")), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_claim_serializes_same_key() {
        let cache = Arc::new(cache(8));
        let first = cache.claim("t", &key("a")).await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _claim = cache.claim("t", &key("a")).await;
                cache.get("t", &key("a"))
            })
        };
        tokio::task::yield_now().await;
        cache.put("t", key("a"), json!("stored"));
        drop(first);

        assert_eq!(waiter.await.unwrap(), Some(json!("stored")));
    }
}
