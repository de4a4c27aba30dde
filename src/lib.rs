pub mod core;
pub mod snapshot;
pub mod index;
pub mod query;
pub mod refresh;
pub mod storage;
pub mod ranking;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                            VITRINA STRUCT ARCHITECTURE                                │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────── CORE LAYER ───────────────────────────────────────┐
│                                                                                        │
│  ┌──────────────────────────────────────────────────────────────────────────────┐    │
│  │                              struct Catalog                                   │    │
│  │  config: Config                     // Intervals, timeouts, cache size        │    │
│  │  storage: Arc<StorageLayout>        // ./database, mirror + ranking files     │    │
│  │  store: Arc<SnapshotStore>          // Pointer to the current version         │    │
│  │  engine: Arc<QueryEngine>           // Read path                              │    │
│  │  refresher: Arc<RefreshCoordinator> // Write path                             │    │
│  └──────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                        │
│  ┌──────────────────┐  ┌──────────────────────┐  ┌──────────────────────────────┐    │
│  │ ProductRecord    │  │ enum StockStatus     │  │ struct CatalogStats          │    │
│  │ • id: ProductId  │  │ • InStock            │  │ • total_products             │    │
│  │ • sku, name      │  │ • OutOfStock         │  │ • snapshot_version, origin   │    │
│  │ • category, sub  │  │ • Other(String)      │  │ • cache_stats, refresh       │    │
│  └──────────────────┘  └──────────────────────┘  └──────────────────────────────┘    │
└────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── SNAPSHOT LAYER ──────────────────────────────────────┐
│                                                                                        │
│  SnapshotStore { current: RwLock<Arc<CatalogVersion>>, next_version: AtomicU64 }       │
│                                                                                        │
│  CatalogVersion { snapshot: Snapshot, indexes: IndexSet }   // installed as one unit   │
│                                                                                        │
│  Snapshot { version, records: Vec<ProductRecord>, captured_at, stats, origin }         │
│  IndexSet { by_id, by_sku, by_category, by_subcategory, by_stock, by_size,             │
│             by_name, by_name_token, subcategory_summary, duplicates }                  │
│                                                     // buckets hold u32 positions      │
└────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────── RELATIONSHIPS ─────────────────────────────────────┐
│                                                                                        │
│  Catalog ──owns──> RefreshCoordinator ──pulls──> dyn ProductSource                     │
│     │                     │                                                            │
│     │                     ├──loads/saves──> MirrorFile (productos_db.json)             │
│     │                     │                                                            │
│     │                     └──installs──> SnapshotStore ──holds──> CatalogVersion       │
│     │                                                                                  │
│     └──owns──> QueryEngine ──reads──> SnapshotStore::current()                         │
│                     │                                                                  │
│                     ├──ranks_with──> RankingOverlay (ventas_analysis.json)             │
│                     │                                                                  │
│                     └──caches_in──> QueryCache (key includes snapshot version)         │
│                                                                                        │
└────────────────────────────────────────────────────────────────────────────────────────┘
*/
