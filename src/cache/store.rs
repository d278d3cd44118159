//! Tagged entry cache with TTL and LRU bounds.
//!
//! Pages compute a key per page or query and populate the cache on miss.
//! Entries may be filed under tags so the invalidation router can drop
//! related entries together; every entry also expires after its TTL.

use std::collections::HashSet;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;

use super::backend::{CacheBackend, CacheError};
use super::config::CacheConfig;
use super::keys::CacheTag;
use super::lock::{rw_read, rw_write};
use super::registry::CacheRegistry;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "corpsite_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "corpsite_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "corpsite_cache_evict_total";
pub(crate) const METRIC_TAG_FLUSH: &str = "corpsite_cache_tag_flush_total";

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// The registry is only touched while the entries lock is held, so an entry
/// and its tag filing change together.
pub struct TagCache<V> {
    entries: RwLock<LruCache<String, Entry<V>>>,
    registry: CacheRegistry,
    default_ttl: Duration,
}

impl<V> TagCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            registry: CacheRegistry::new(),
            default_ttl: config.default_ttl(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fresh value for `key`; expired entries are dropped and count as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let lookup = entries
            .get(key)
            .map(|entry| entry.is_fresh(now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(value)
            }
            Some(None) => {
                entries.pop(key);
                self.registry.unregister(key);
                drop(entries);
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration, tags: &[CacheTag]) {
        let key = key.into();
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);

        let mut entries = rw_write(&self.entries, SOURCE, "put");
        let displaced = entries
            .push(key.clone(), Entry { value, expires_at })
            .map(|(old_key, _)| old_key)
            .filter(|old_key| *old_key != key);

        if let Some(evicted) = displaced {
            self.registry.unregister(&evicted);
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        self.registry
            .register(&key, tags.iter().cloned().collect::<HashSet<_>>());
    }

    /// Read-through lookup without tags.
    ///
    /// On a hit `compute` is not called; on a miss it is called exactly once
    /// and its value stored for `ttl`. Concurrent misses may both compute.
    pub fn get_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.tagged(&[]).get_or_compute(key, ttl, compute)
    }

    /// Read-through lookup without tags, stored for the configured default TTL.
    pub fn get_or_compute_default<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.tagged(&[]).get_or_compute_default(key, compute)
    }

    /// Scope subsequent writes to `tags`.
    pub fn tagged<'a>(&'a self, tags: &'a [CacheTag]) -> TaggedCache<'a, V> {
        TaggedCache { cache: self, tags }
    }

    /// Remove a single key.
    pub fn forget(&self, key: &str) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "forget");
        let removed = entries.pop(key).is_some();
        self.registry.unregister(key);
        removed
    }

    /// Remove every entry filed under `tag`, returning how many were present.
    pub fn flush_tag(&self, tag: &CacheTag) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "flush_tag");
        let keys = self.registry.take_tag(tag);
        if keys.is_empty() {
            return 0;
        }

        let removed = keys
            .iter()
            .filter(|key| entries.pop(key.as_str()).is_some())
            .count();
        counter!(METRIC_TAG_FLUSH).increment(removed as u64);
        removed
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<CacheTag> {
        self.registry.tags_for_key(key)
    }

    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        entries.clear();
        self.registry.clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A view of a [`TagCache`] that files new entries under a fixed tag list.
pub struct TaggedCache<'a, V> {
    cache: &'a TagCache<V>,
    tags: &'a [CacheTag],
}

impl<V> TaggedCache<'_, V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.cache.put(key, value, ttl, self.tags);
    }

    pub fn get_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.cache.get(key) {
            return value;
        }

        let value = compute();
        self.cache.put(key, value.clone(), ttl, self.tags);
        value
    }

    pub fn get_or_compute_default<F>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_compute(key, self.cache.default_ttl, compute)
    }
}

#[async_trait]
impl<V> CacheBackend for TagCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn evict_tag(&self, tag: &CacheTag) -> Result<usize, CacheError> {
        Ok(self.flush_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Arc;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache() -> TagCache<String> {
        TagCache::new(&CacheConfig::default())
    }

    #[test]
    fn hit_skips_compute() {
        let cache = cache();
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value = cache.get_or_compute("home", HOUR, || {
                calls.set(calls.get() + 1);
                "rendered".to_string()
            });
            assert_eq!(value, "rendered");
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_ttl_never_serves_a_hit() {
        let cache = cache();
        let calls = Cell::new(0);

        for _ in 0..2 {
            cache.get_or_compute("home", Duration::ZERO, || {
                calls.set(calls.get() + 1);
                "rendered".to_string()
            });
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn default_ttl_comes_from_config() {
        let cache = cache();
        let calls = Cell::new(0);
        for _ in 0..2 {
            cache
                .tagged(&[CacheTag::Clients])
                .get_or_compute_default("clients", || {
                    calls.set(calls.get() + 1);
                    "logos".to_string()
                });
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.default_ttl(), HOUR);

        let expiring: TagCache<String> = TagCache::new(&CacheConfig {
            default_ttl_secs: 0,
            ..Default::default()
        });
        for _ in 0..2 {
            expiring.get_or_compute_default("home", || {
                calls.set(calls.get() + 1);
                "rendered".to_string()
            });
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn expired_read_and_rewrite_keep_tag_filing() {
        let cache = cache();
        cache.put("home", "v1".to_string(), Duration::ZERO, &[CacheTag::Clients]);
        assert!(cache.get("home").is_none());
        assert!(cache.tags_for_key("home").is_empty());

        cache.tagged(&[CacheTag::Clients]).put("home", "v2".to_string(), HOUR);
        assert_eq!(cache.tags_for_key("home").len(), 1);
        assert_eq!(cache.flush_tag(&CacheTag::Clients), 1);
    }

    #[test]
    fn concurrent_reads_and_writes_never_orphan_tagged_entries() {
        let cache = Arc::new(cache());
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let ttl = if (worker + round) % 2 == 0 {
                            Duration::ZERO
                        } else {
                            HOUR
                        };
                        cache
                            .tagged(&[CacheTag::Products])
                            .put("shared", format!("{worker}:{round}"), ttl);
                        let _ = cache.get("shared");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }

        // Whatever survived must still be reachable through its tag.
        cache.flush_tag(&CacheTag::Products);
        assert!(cache.get("shared").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = cache();
        cache.put("home", "v1".to_string(), Duration::from_millis(20), &[]);
        assert_eq!(cache.get("home").as_deref(), Some("v1"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("home").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn flush_tag_removes_only_tagged_entries() {
        let cache = cache();
        let acme = CacheTag::Division("acme".to_string());
        cache
            .tagged(&[CacheTag::Divisions, acme.clone()])
            .put("division:acme:page", "acme".to_string(), HOUR);
        cache
            .tagged(&[CacheTag::Divisions])
            .put("divisions:index", "index".to_string(), HOUR);
        cache.tagged(&[CacheTag::Clients]).put("clients", "c".to_string(), HOUR);

        assert_eq!(cache.flush_tag(&acme), 1);
        assert!(cache.get("division:acme:page").is_none());
        assert!(cache.get("divisions:index").is_some());

        assert_eq!(cache.flush_tag(&CacheTag::Divisions), 1);
        assert!(cache.get("clients").is_some());
    }

    #[test]
    fn flush_is_idempotent() {
        let cache = cache();
        cache
            .tagged(&[CacheTag::Milestones])
            .put("about:history", "timeline".to_string(), HOUR);

        assert_eq!(cache.flush_tag(&CacheTag::Milestones), 1);
        assert_eq!(cache.flush_tag(&CacheTag::Milestones), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_eviction_unregisters_tags() {
        let config = CacheConfig {
            capacity: 1,
            ..Default::default()
        };
        let cache: TagCache<String> = TagCache::new(&config);
        cache.tagged(&[CacheTag::Clients]).put("a", "a".to_string(), HOUR);
        cache.tagged(&[CacheTag::Clients]).put("b", "b".to_string(), HOUR);

        assert!(cache.get("a").is_none());
        assert!(cache.tags_for_key("a").is_empty());
        assert_eq!(cache.flush_tag(&CacheTag::Clients), 1);
    }

    #[test]
    fn forget_removes_entry_and_tags() {
        let cache = cache();
        cache.tagged(&[CacheTag::Settings]).put("layout", "x".to_string(), HOUR);

        assert!(cache.forget("layout"));
        assert!(cache.tags_for_key("layout").is_empty());
        assert!(!cache.forget("layout"));
    }

    #[tokio::test]
    async fn evict_tag_on_empty_cache_is_zero() {
        let cache = cache();
        let removed = cache
            .evict_tag(&CacheTag::MediaHomeSlider)
            .await
            .expect("in-memory eviction never fails");
        assert_eq!(removed, 0);
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let cache = cache();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.put("home", "v".to_string(), HOUR, &[]);
        assert_eq!(cache.get("home").as_deref(), Some("v"));
    }
}
