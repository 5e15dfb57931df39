//! Per-tool lock shards.
//!
//! The outer `RwLock` only guards the map of shards and is held for a
//! lookup or an insert; each tool's state sits behind its own `Mutex`.
//! Calls to unrelated tools never contend. Neither lock is ever held across
//! an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

pub struct PerToolShards<T> {
    shards: RwLock<HashMap<String, Arc<Mutex<T>>>>,
}

impl<T> Default for PerToolShards<T> {
    fn default() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Default> PerToolShards<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shard for `tool`, created on first use
    pub fn shard(&self, tool: &str) -> Arc<Mutex<T>> {
        if let Some(shard) = self.get(tool) {
            return shard;
        }
        let mut shards = self.shards.write().unwrap_or_else(|e| e.into_inner());
        shards.entry(tool.to_string()).or_default().clone()
    }
}

impl<T> PerToolShards<T> {
    pub fn get(&self, tool: &str) -> Option<Arc<Mutex<T>>> {
        self.shards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tool)
            .cloned()
    }

    /// Tool names with a shard, sorted
    pub fn tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self
            .shards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        tools.sort();
        tools
    }

    pub fn clear(&self) {
        self.shards
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Lock a shard, recovering the data if a previous holder panicked
pub fn lock<T>(shard: &Mutex<T>) -> MutexGuard<'_, T> {
    shard.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_shared_per_tool() {
        let shards: PerToolShards<u32> = PerToolShards::new();
        let a = shards.shard("weather.get");
        *lock(&a) += 1;
        let again = shards.shard("weather.get");
        assert_eq!(*lock(&again), 1);
        assert!(Arc::ptr_eq(&a, &again));

        let other = shards.shard("search.query");
        assert_eq!(*lock(&other), 0);
        assert_eq!(shards.tools(), vec!["search.query", "weather.get"]);
    }

    #[test]
    fn test_get_does_not_create() {
        let shards: PerToolShards<u32> = PerToolShards::new();
        assert!(shards.get("missing").is_none());
        assert!(shards.tools().is_empty());
    }
}
