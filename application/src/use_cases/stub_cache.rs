//! Memoized stub generation keyed by catalog content hash.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;
use toolscript_domain::{StubBundle, StubGenerator, ToolCatalog};

/// Bundles kept before the oldest is dropped
const DEFAULT_CAPACITY: usize = 8;

pub struct StubCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    bundles: HashMap<String, Arc<StubBundle>>,
    order: VecDeque<String>,
}

impl Default for StubCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StubCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get_or_generate(&self, catalog: &ToolCatalog) -> Arc<StubBundle> {
        let hash = catalog.content_hash();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bundle) = inner.bundles.get(&hash) {
            return bundle.clone();
        }

        debug!("Generating stubs for catalog {}", hash);
        let bundle = Arc::new(StubGenerator::generate(catalog));
        while inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.bundles.remove(&oldest);
            }
        }
        inner.order.push_back(hash.clone());
        inner.bundles.insert(hash, bundle.clone());
        bundle
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .bundles
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolscript_domain::{ToolDefinition, ToolKind};

    fn catalog(version: &str) -> ToolCatalog {
        ToolCatalog::new("test", version)
            .with_tool(ToolDefinition::new("d", "t", ToolKind::RemoteWorker, ""))
            .unwrap()
    }

    #[test]
    fn test_same_catalog_reuses_bundle() {
        let cache = StubCache::default();
        let a = cache.get_or_generate(&catalog("1"));
        let b = cache.get_or_generate(&catalog("1"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let cache = StubCache::new(2);
        let first = cache.get_or_generate(&catalog("1"));
        cache.get_or_generate(&catalog("2"));
        cache.get_or_generate(&catalog("3"));
        assert_eq!(cache.len(), 2);

        let regenerated = cache.get_or_generate(&catalog("1"));
        assert!(!Arc::ptr_eq(&first, &regenerated));
        assert_eq!(*first, *regenerated);
    }
}
