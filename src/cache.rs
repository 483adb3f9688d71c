//! In-memory TTL memoization for derived views of the snapshot.
//!
//! Each [`TtlCache`] holds one kind of value under string keys and expires
//! entries a fixed time after insertion. Caches are owned by the store that
//! uses them, so two stores never share entries.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

/// Default lifetimes.
pub mod ttl {
    use std::time::Duration;

    /// Category and tag lists, label counts.
    pub const FACETS: Duration = Duration::from_secs(10 * 60);
    /// Search results, per query string.
    pub const SEARCH: Duration = Duration::from_secs(60);
}

pub const DEFAULT_CAPACITY: u64 = 1000;

pub struct TtlCache<V> {
    name: &'static str,
    inner: Cache<String, Arc<V>>,
}

impl<V: Send + Sync + 'static> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { name, inner }
    }

    /// Cached value for `key`, or run `compute` and cache its result.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(hit) = self.inner.get(key) {
            debug!(cache = self.name, key, "cache hit");
            return hit;
        }

        debug!(cache = self.name, key, "cache miss, computing");
        let value = Arc::new(compute());
        self.inner.insert(key.to_string(), Arc::clone(&value));
        value
    }

    /// Drop every entry now.
    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    /// Keys of live entries.
    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|(k, _)| (*k).clone()).collect()
    }
}
