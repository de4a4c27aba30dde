use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::stats::{CatalogStats, HealthCheck, HealthCheckResult, HealthStatus};
use crate::query::engine::QueryEngine;
use crate::ranking::overlay::RankingOverlay;
use crate::refresh::coordinator::{RefreshCoordinator, RefreshOutcome};
use crate::refresh::source::ProductSource;
use crate::snapshot::snapshot::SnapshotOrigin;
use crate::snapshot::store::SnapshotStore;
use crate::storage::layout::StorageLayout;
use crate::storage::mirror::MirrorFile;

/// The catalog cache: owns the snapshot store, the query engine and the
/// refresh coordinator, and wires the injected source into them.
pub struct Catalog {
    config: Config,

    storage: Arc<StorageLayout>,

    store: Arc<SnapshotStore>,
    engine: Arc<QueryEngine>,         // read path
    refresher: Arc<RefreshCoordinator>, // write path
}

impl Catalog {
    /// Open the catalog and run the first load. Ranking data is read from
    /// the storage directory.
    pub async fn open(config: Config, source: Arc<dyn ProductSource>) -> Result<Self> {
        let storage = StorageLayout::new(config.storage_path.clone())?;
        let ranking = RankingOverlay::load(storage.ranking_path());
        Ok(Self::assemble(config, storage, source, ranking).await)
    }

    /// Open with ranking data supplied by the caller instead of the side file.
    pub async fn open_with_ranking(
        config: Config,
        source: Arc<dyn ProductSource>,
        ranking: RankingOverlay,
    ) -> Result<Self> {
        let storage = StorageLayout::new(config.storage_path.clone())?;
        Ok(Self::assemble(config, storage, source, ranking).await)
    }

    async fn assemble(
        config: Config,
        storage: StorageLayout,
        source: Arc<dyn ProductSource>,
        ranking: RankingOverlay,
    ) -> Self {
        let storage = Arc::new(storage);
        let store = Arc::new(SnapshotStore::new());

        let engine = Arc::new(QueryEngine::new(store.clone(), Arc::new(ranking), &config));

        let refresher = Arc::new(RefreshCoordinator::new(
            store.clone(),
            source,
            MirrorFile::new(storage.mirror_path()),
            &config,
        ));

        let version = refresher.bootstrap().await;
        log::info!(
            "[Catalog] Ready: {} products, version {}, origin {:?}",
            version.snapshot.len(),
            version.version(),
            version.snapshot.origin
        );

        Catalog {
            config,
            storage,
            store,
            engine,
            refresher,
        }
    }

    pub fn query(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn engine(&self) -> Arc<QueryEngine> {
        self.engine.clone()
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    /// Start the periodic refresh task.
    pub fn start_refresh(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.refresher.clone().spawn(shutdown)
    }

    /// Refresh immediately, outside the periodic schedule.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let outcome = self.refresher.refresh_once().await;
        if outcome.is_installed() {
            self.engine.prune_cache();
        }
        outcome
    }

    pub fn catalog_stats(&self) -> CatalogStats {
        let version = self.store.current();
        let snapshot = &version.snapshot;

        CatalogStats {
            total_products: snapshot.stats.total_products,
            category_count: snapshot.stats.categories.len(),
            last_update: snapshot.captured_at,
            snapshot_version: version.version(),
            origin: snapshot.origin,
            duplicate_ids: version.indexes.duplicates.ids.len(),
            duplicate_skus: version.indexes.duplicates.skus.len(),

            products_by_category: snapshot.stats.categories.clone(),
            products_by_subcategory: snapshot.stats.subcategories.clone(),
            products_by_stock: snapshot.stats.stock.clone(),
            price_b: snapshot.stats.price_b,

            mirror_size_bytes: self.refresher.mirror().size_bytes(),
            indexes_built: version.indexes.index_count(),
            ranked_skus: self.engine.ranking().len(),

            last_query_us: self.engine.last_query_us(),
            queries_served: self.engine.queries_served(),
            cache_stats: self.engine.cache_stats(),

            refresh_state: self.refresher.state(),
            refresh: self.refresher.counters(),
        }
    }

    pub fn health(&self) -> HealthCheckResult {
        let version = self.store.current();
        let counters = self.refresher.counters();

        let snapshot_status = match version.snapshot.origin {
            SnapshotOrigin::Empty => HealthStatus::Unhealthy("no snapshot installed".to_string()),
            SnapshotOrigin::Placeholder => {
                HealthStatus::Degraded("serving placeholder data".to_string())
            }
            SnapshotOrigin::Source | SnapshotOrigin::Mirror => HealthStatus::Healthy,
        };

        let refresh_status = if counters.last_attempt_failed() {
            HealthStatus::Degraded("last refresh failed".to_string())
        } else {
            HealthStatus::Healthy
        };

        HealthCheckResult::from_checks(vec![
            HealthCheck::new(
                "snapshot",
                snapshot_status,
                Some(format!(
                    "version {} with {} products",
                    version.version(),
                    version.snapshot.len()
                )),
            ),
            HealthCheck::new("refresh", refresh_status, counters.last_error.clone()),
            HealthCheck::new(
                "ranking",
                HealthStatus::Healthy,
                Some(match self.engine.ranking().generated_at() {
                    Some(generated) => format!("{} ranked SKUs, generated {}", self.engine.ranking().len(), generated),
                    None => format!("{} ranked SKUs", self.engine.ranking().len()),
                }),
            ),
        ])
    }
}
