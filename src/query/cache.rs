use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use crate::index::index_set::Position;
use crate::query::types::Pagination;

/// Which lookup produced a cached page.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum QueryOp {
    Category,
    Subcategory,
    Stock,
    Size,
    Search,
    ExactName,
}

/// How the result set behind a cached page was produced.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum KeyVariant {
    Plain,
    /// Bucket sorted by units sold.
    Ranked,
    /// Search over the extended text.
    Extended,
}

/// Cache key. The snapshot version is part of the key, so a page computed
/// against an older version can never be returned for a newer one.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryKey {
    pub version: u64,
    pub op: QueryOp,
    pub key: String,
    pub limit: Option<usize>,
    pub offset: usize,
    pub variant: KeyVariant,
}

impl QueryKey {
    pub fn new(version: u64, op: QueryOp, key: &str, pagination: Pagination, variant: KeyVariant) -> Self {
        QueryKey {
            version,
            op,
            key: key.to_string(),
            limit: pagination.limit,
            offset: pagination.offset,
            variant,
        }
    }
}

/// Positions of one result page plus the size of the bucket it was cut from.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub positions: Arc<[Position]>,
    pub total: usize,
}

/// Query result cache for avoiding recomputation
pub struct QueryCache {
    cache: Mutex<LruCache<QueryKey, CachedPage>>,
    size_limit: usize,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

impl QueryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        QueryCache {
            cache: Mutex::new(LruCache::new(capacity)),
            size_limit: capacity.get(),
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    /// `None` when `size_limit` is 0.
    pub fn with_limit(size_limit: usize) -> Option<Self> {
        NonZeroUsize::new(size_limit).map(QueryCache::new)
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedPage> {
        let mut cache = self.cache.lock();
        if let Some(page) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(page.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, key: QueryKey, page: CachedPage) {
        self.cache.lock().put(key, page);
    }

    /// Drop entries computed against versions older than `version`.
    pub fn evict_before(&self, version: u64) {
        let mut cache = self.cache.lock();
        let stale: Vec<QueryKey> = cache
            .iter()
            .filter(|(key, _)| key.version < version)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.lock().len(),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(version: u64, category: &str) -> QueryKey {
        QueryKey::new(version, QueryOp::Category, category, Pagination::all(), KeyVariant::Ranked)
    }

    fn page(positions: &[Position]) -> CachedPage {
        CachedPage {
            positions: positions.into(),
            total: positions.len(),
        }
    }

    #[test]
    fn hits_and_misses_are_counted() {
        let cache = QueryCache::with_limit(4).unwrap();
        assert!(cache.get(&key(1, "RON")).is_none());

        cache.put(key(1, "RON"), page(&[2, 5]));
        let hit = cache.get(&key(1, "RON")).unwrap();
        assert_eq!(&*hit.positions, &[2, 5]);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn version_is_part_of_the_key() {
        let cache = QueryCache::with_limit(4).unwrap();
        cache.put(key(1, "RON"), page(&[0]));

        assert!(cache.get(&key(2, "RON")).is_none());

        cache.put(key(2, "RON"), page(&[1]));
        cache.evict_before(2);
        assert_eq!(cache.stats().size, 1);
        assert!(cache.get(&key(2, "RON")).is_some());
    }

    #[test]
    fn variant_is_part_of_the_key() {
        let cache = QueryCache::with_limit(4).unwrap();
        let search = |variant| QueryKey::new(1, QueryOp::Search, "ron", Pagination::all(), variant);
        cache.put(search(KeyVariant::Plain), page(&[3]));

        assert!(cache.get(&search(KeyVariant::Extended)).is_none());
        assert!(cache.get(&search(KeyVariant::Plain)).is_some());
    }

    #[test]
    fn zero_capacity_disables_the_cache() {
        assert!(QueryCache::with_limit(0).is_none());
    }
}
