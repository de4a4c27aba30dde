use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use rand::Rng;
use rand::seq::SliceRandom;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{ProductId, ProductRecord, StockStatus};
use crate::index::index_set::{IndexSet, Position, SubcategorySummary, intersect_sorted};
use crate::index::tokenizer::NameTokenizer;
use crate::query::cache::{CacheStats, CachedPage, KeyVariant, QueryCache, QueryKey, QueryOp};
use crate::query::types::{
    CategoryCount, Page, Pagination, QueryMeta, QueryResponse, ResultCount, TopSeller,
};
use crate::ranking::overlay::RankingOverlay;
use crate::snapshot::store::{CatalogVersion, SnapshotStore};

/// Default number of categories returned by [`QueryEngine::categories`].
pub const DEFAULT_CATEGORY_LIMIT: usize = 10;

/// Read-only query API over the current catalog version.
///
/// Every operation fetches the current version once and answers from it, so
/// a refresh installed mid-query is only visible to later calls.
pub struct QueryEngine {
    store: Arc<SnapshotStore>,
    ranking: Arc<RankingOverlay>,
    cache: Option<QueryCache>,
    tokenizer: NameTokenizer,
    extended_search: bool,
    featured_default_limit: usize,
    last_query_us: AtomicU64,
    queries_served: AtomicU64,
    // Newest version whose older cache entries have been evicted.
    pruned_version: AtomicU64,
}

impl QueryEngine {
    pub fn new(store: Arc<SnapshotStore>, ranking: Arc<RankingOverlay>, config: &Config) -> Self {
        QueryEngine {
            store,
            ranking,
            cache: QueryCache::with_limit(config.query_cache_size),
            tokenizer: NameTokenizer::default(),
            extended_search: config.extended_search,
            featured_default_limit: config.featured_default_limit,
            last_query_us: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            pruned_version: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn ranking(&self) -> &RankingOverlay {
        &self.ranking
    }

    pub fn get_by_id(&self, id: i64) -> QueryResponse<Option<ProductRecord>> {
        let start = Instant::now();
        let version = self.store.current();
        let record = version.by_id(ProductId(id)).cloned();
        self.respond(record, &version, false, start)
    }

    pub fn get_by_sku(&self, sku: &str) -> QueryResponse<Option<ProductRecord>> {
        let start = Instant::now();
        let version = self.store.current();
        let record = version.by_sku(sku.trim()).cloned();
        self.respond(record, &version, false, start)
    }

    pub fn list_all(&self, limit: Option<i64>, offset: i64) -> Result<QueryResponse<Page<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let records = pagination.slice(&version.snapshot.records).to_vec();
        let page = Page::new(records, version.snapshot.len(), pagination);
        Ok(self.respond(page, &version, false, start))
    }

    /// Records of `category`. With `order_by_sales` the page is cut from the
    /// bucket sorted by units sold, descending; unranked SKUs count as 0 and
    /// ties keep snapshot order.
    pub fn list_by_category(
        &self,
        category: &str,
        limit: Option<i64>,
        offset: i64,
        order_by_sales: bool,
    ) -> Result<QueryResponse<Page<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let bucket = version.indexes.category(category);
        Ok(self.bucket_page(&version, QueryOp::Category, category, bucket, order_by_sales, pagination, start))
    }

    pub fn list_by_subcategory(
        &self,
        subcategory: &str,
        limit: Option<i64>,
        offset: i64,
        order_by_sales: bool,
    ) -> Result<QueryResponse<Page<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let bucket = version.indexes.subcategory(subcategory);
        Ok(self.bucket_page(&version, QueryOp::Subcategory, subcategory, bucket, order_by_sales, pagination, start))
    }

    pub fn list_by_stock(
        &self,
        status: &StockStatus,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<QueryResponse<Page<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let bucket = version.indexes.stock(status);
        Ok(self.bucket_page(&version, QueryOp::Stock, status.as_str(), bucket, false, pagination, start))
    }

    pub fn list_by_size(
        &self,
        size: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<QueryResponse<Page<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let bucket = version.indexes.size(size);
        Ok(self.bucket_page(&version, QueryOp::Size, size, bucket, false, pagination, start))
    }

    /// All records whose name equals `name`, ignoring case.
    pub fn list_by_exact_name(&self, name: &str) -> QueryResponse<Vec<ProductRecord>> {
        let start = Instant::now();
        let version = self.store.current();
        let bucket = version.indexes.exact_name(name);
        let page = self.bucket_page(&version, QueryOp::ExactName, name, bucket, false, Pagination::all(), start);
        page.map(|page| page.items)
    }

    /// Case-insensitive substring search over product names and SKUs, in
    /// snapshot order. The scan stops as soon as `offset + limit` matches are
    /// found.
    ///
    /// When nothing matches and the query has several words, records whose
    /// name contains every word are returned instead.
    pub fn search_by_name(
        &self,
        query: &str,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<QueryResponse<Vec<ProductRecord>>> {
        let pagination = Pagination::new(limit, offset)?;
        let start = Instant::now();
        let version = self.store.current();
        let needle = query.trim().to_lowercase();

        let variant = if self.extended_search { KeyVariant::Extended } else { KeyVariant::Plain };
        let key = QueryKey::new(version.version(), QueryOp::Search, &needle, pagination, variant);
        if let Some(cached) = self.cached(&key) {
            let records = version.collect(&cached.positions);
            return Ok(self.respond(records, &version, true, start));
        }

        let positions = if pagination.is_empty_page() {
            Vec::new()
        } else {
            let mut matches = self.scan(&version.indexes, version.snapshot.len(), &needle, pagination.end());
            if matches.is_empty() {
                matches = self.token_fallback(&version.indexes, &needle);
            }
            pagination.slice(&matches).to_vec()
        };

        self.remember(key, &positions, positions.len());
        let records = version.collect(&positions);
        Ok(self.respond(records, &version, false, start))
    }

    /// Matches in snapshot order, stopping after `wanted` of them.
    fn scan(&self, indexes: &IndexSet, len: usize, needle: &str, wanted: Option<usize>) -> Vec<Position> {
        let mut matches: Vec<Position> = Vec::new();

        for pos in 0..len as Position {
            if !needle.is_empty() && !indexes.search_text(pos, self.extended_search).contains(needle) {
                continue;
            }
            matches.push(pos);
            if wanted.is_some_and(|wanted| matches.len() >= wanted) {
                break;
            }
        }

        matches
    }

    fn token_fallback(&self, indexes: &IndexSet, needle: &str) -> Vec<Position> {
        let tokens = self.tokenizer.unique_tokens(needle);
        if tokens.len() < 2 {
            return Vec::new();
        }
        let lists: Vec<&[Position]> = tokens.iter().map(|token| indexes.name_token(token)).collect();
        intersect_sorted(&lists)
    }

    /// Subcategories with total and in-stock counts, ordered by display rank.
    pub fn category_summary(&self) -> QueryResponse<Vec<SubcategorySummary>> {
        let start = Instant::now();
        let version = self.store.current();
        let summary = version.indexes.subcategory_summary().to_vec();
        self.respond(summary, &version, false, start)
    }

    /// Non-empty categories with their product counts, largest first.
    pub fn categories(&self, limit: Option<usize>) -> QueryResponse<Vec<CategoryCount>> {
        let start = Instant::now();
        let version = self.store.current();
        let limit = limit.unwrap_or(DEFAULT_CATEGORY_LIMIT);

        let mut categories: Vec<CategoryCount> = version
            .snapshot
            .stats
            .categories
            .iter()
            .filter(|(category, _)| !category.is_empty())
            .map(|(category, &count)| CategoryCount {
                category: category.clone(),
                count,
            })
            .collect();
        // BTreeMap iteration is already name-ordered; the stable sort keeps it for ties.
        categories.sort_by_key(|c| Reverse(c.count));
        categories.truncate(limit);

        self.respond(categories, &version, false, start)
    }

    /// Uniform random sample of in-stock products, `limit` defaulting to the
    /// configured featured size.
    pub fn featured_sample(&self, limit: Option<usize>) -> QueryResponse<Vec<ProductRecord>> {
        self.featured_sample_with(limit, &mut rand::thread_rng())
    }

    pub fn featured_sample_with<R: Rng + ?Sized>(
        &self,
        limit: Option<usize>,
        rng: &mut R,
    ) -> QueryResponse<Vec<ProductRecord>> {
        let start = Instant::now();
        let version = self.store.current();
        let limit = limit.unwrap_or(self.featured_default_limit);
        let bucket = version.indexes.stock(&StockStatus::InStock);

        let picked: Vec<Position> = if bucket.len() <= limit {
            let mut all = bucket.to_vec();
            all.shuffle(rng);
            all
        } else {
            rand::seq::index::sample(rng, bucket.len(), limit)
                .into_iter()
                .map(|i| bucket[i])
                .collect()
        };

        let records = version.collect(&picked);
        self.respond(records, &version, false, start)
    }

    /// Best sellers from the ranking overlay that are still in the catalog.
    /// `None` selects the overall ranking.
    pub fn top_sellers(&self, category: Option<&str>, limit: usize) -> QueryResponse<Vec<TopSeller>> {
        let start = Instant::now();
        let version = self.store.current();
        let ranked = match category {
            Some(category) => self.ranking.top_for_category(category),
            None => self.ranking.top_general(),
        };

        let sellers: Vec<TopSeller> = ranked
            .iter()
            .filter_map(|entry| {
                version.by_sku(&entry.sku).map(|record| (entry.total_sold, record.clone()))
            })
            .take(limit)
            .enumerate()
            .map(|(i, (total_sold, product))| TopSeller {
                rank: i + 1,
                total_sold,
                product,
            })
            .collect();

        self.respond(sellers, &version, false, start)
    }

    pub fn count_total(&self) -> QueryResponse<usize> {
        let start = Instant::now();
        let version = self.store.current();
        let count = version.snapshot.len();
        self.respond(count, &version, false, start)
    }

    pub fn count_by_category(&self, category: &str) -> QueryResponse<usize> {
        let start = Instant::now();
        let version = self.store.current();
        let count = version.indexes.category(category).len();
        self.respond(count, &version, false, start)
    }

    pub fn count_by_subcategory(&self, subcategory: &str) -> QueryResponse<usize> {
        let start = Instant::now();
        let version = self.store.current();
        let count = version.indexes.subcategory(subcategory).len();
        self.respond(count, &version, false, start)
    }

    pub fn count_by_stock(&self, status: &StockStatus) -> QueryResponse<usize> {
        let start = Instant::now();
        let version = self.store.current();
        let count = version.indexes.stock(status).len();
        self.respond(count, &version, false, start)
    }

    /// Duration of the most recent query, in microseconds.
    pub fn last_query_us(&self) -> u64 {
        self.last_query_us.load(Ordering::Relaxed)
    }

    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(QueryCache::stats).unwrap_or_default()
    }

    /// Drop cached pages of versions older than the current one. Also
    /// happens on its own the first time a page of a newer version is cached.
    pub fn prune_cache(&self) {
        if let Some(cache) = &self.cache {
            let current = self.store.current_version();
            self.pruned_version.fetch_max(current, Ordering::AcqRel);
            cache.evict_before(current);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bucket_page(
        &self,
        version: &CatalogVersion,
        op: QueryOp,
        key: &str,
        bucket: &[Position],
        order_by_sales: bool,
        pagination: Pagination,
        start: Instant,
    ) -> QueryResponse<Page<ProductRecord>> {
        let ranked = order_by_sales && !self.ranking.is_empty();
        let variant = if ranked { KeyVariant::Ranked } else { KeyVariant::Plain };
        let cache_key = QueryKey::new(version.version(), op, key, pagination, variant);

        if let Some(cached) = self.cached(&cache_key) {
            let page = Page::new(version.collect(&cached.positions), cached.total, pagination);
            return self.respond(page, version, true, start);
        }

        let sorted;
        let ordered: &[Position] = if ranked {
            sorted = self.rank_by_sales(version, bucket);
            &sorted
        } else {
            bucket
        };
        let window = pagination.slice(ordered);

        self.remember(cache_key, window, bucket.len());
        let page = Page::new(version.collect(window), bucket.len(), pagination);
        self.respond(page, version, false, start)
    }

    /// Private copy of `bucket`, stably sorted by units sold, descending.
    fn rank_by_sales(&self, version: &CatalogVersion, bucket: &[Position]) -> Vec<Position> {
        let mut ranked = bucket.to_vec();
        ranked.sort_by_cached_key(|&pos| {
            Reverse(version.record(pos).map(|r| self.ranking.score(&r.sku)).unwrap_or(0))
        });
        ranked
    }

    fn cached(&self, key: &QueryKey) -> Option<CachedPage> {
        self.cache.as_ref().and_then(|cache| cache.get(key))
    }

    fn remember(&self, key: QueryKey, positions: &[Position], total: usize) {
        if let Some(cache) = &self.cache {
            if self.pruned_version.fetch_max(key.version, Ordering::AcqRel) < key.version {
                cache.evict_before(key.version);
            }
            cache.put(key, CachedPage {
                positions: positions.into(),
                total,
            });
        }
    }

    fn respond<T: ResultCount>(
        &self,
        data: T,
        version: &CatalogVersion,
        cache_hit: bool,
        start: Instant,
    ) -> QueryResponse<T> {
        let took_us = start.elapsed().as_micros() as u64;
        self.last_query_us.store(took_us, Ordering::Relaxed);
        self.queries_served.fetch_add(1, Ordering::Relaxed);

        QueryResponse {
            meta: QueryMeta {
                took_us,
                cache_hit,
                count: data.result_count(),
                snapshot_version: version.version(),
            },
            data,
        }
    }
}
