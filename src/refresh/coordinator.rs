use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::index::index_set::IndexSet;
use crate::index::tokenizer::NameTokenizer;
use crate::refresh::source::{ProductSource, normalize_rows};
use crate::snapshot::snapshot::{Snapshot, SnapshotOrigin};
use crate::snapshot::store::{CatalogVersion, SnapshotStore};
use crate::storage::mirror::MirrorFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshState {
    Cold,
    Loading,
    Ready,
    Refreshing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl RefreshCounters {
    /// True when the most recent pull failed.
    pub fn last_attempt_failed(&self) -> bool {
        match (self.last_error_at, self.last_success) {
            (Some(failed), Some(succeeded)) => failed > succeeded,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Installed {
        version: u64,
        records: usize,
        persisted: bool,
    },
    Failed {
        reason: String,
    },
    /// A pull that timed out earlier is still blocked on the source.
    Skipped,
}

impl RefreshOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, RefreshOutcome::Installed { .. })
    }
}

/// Pulls the product table, builds a new version and swaps it in.
///
/// A failed pull never touches the current version; the catalog keeps
/// serving the last good snapshot until a later pull succeeds.
pub struct RefreshCoordinator {
    store: Arc<SnapshotStore>,
    source: Arc<dyn ProductSource>,
    mirror: MirrorFile,
    tokenizer: NameTokenizer,
    persist_mirror: bool,
    source_timeout: Duration,
    refresh_interval: Duration,
    state: Mutex<RefreshState>,
    counters: Mutex<RefreshCounters>,
    // Single writer: one pull/build/install at a time.
    pull_lock: tokio::sync::Mutex<()>,
    // Set while a blocking fetch runs, including one abandoned by a timeout.
    fetch_in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the blocking fetch ends, however it ends.
struct FetchGuard(Arc<AtomicBool>);

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SnapshotStore>,
        source: Arc<dyn ProductSource>,
        mirror: MirrorFile,
        config: &Config,
    ) -> Self {
        RefreshCoordinator {
            store,
            source,
            mirror,
            tokenizer: NameTokenizer::default(),
            persist_mirror: config.persist_mirror,
            source_timeout: config.source_timeout(),
            refresh_interval: config.refresh_interval(),
            state: Mutex::new(RefreshState::Cold),
            counters: Mutex::new(RefreshCounters::default()),
            pull_lock: tokio::sync::Mutex::new(()),
            fetch_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RefreshState {
        *self.state.lock()
    }

    pub fn counters(&self) -> RefreshCounters {
        self.counters.lock().clone()
    }

    pub fn mirror(&self) -> &MirrorFile {
        &self.mirror
    }

    /// First load: the mirror if there is one, else the source, else the
    /// placeholder snapshot. Always ends `Ready` with a version installed.
    pub async fn bootstrap(&self) -> Arc<CatalogVersion> {
        let _guard = self.pull_lock.lock().await;
        self.set_state(RefreshState::Loading);

        let version = match self.load_mirror().await {
            Some(snapshot) => {
                log::info!(
                    "[Refresh] Loaded {} products from mirror {}",
                    snapshot.len(),
                    self.mirror.path().display()
                );
                self.install(snapshot)
            }
            None => match self.pull_and_install().await {
                Some((version, _)) => version,
                None => {
                    log::warn!("[Refresh] No mirror and source unavailable, serving placeholder data");
                    self.install(Snapshot::placeholder())
                }
            },
        };

        self.set_state(RefreshState::Ready);
        version
    }

    /// One pull/build/install cycle. On failure the current version stays.
    /// Skipped without counting an attempt while an earlier fetch is still
    /// blocked on the source.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let _guard = self.pull_lock.lock().await;
        if self.fetch_in_flight() {
            log::warn!("[Refresh] Previous pull from {} still running, skipping refresh", self.source.name());
            return RefreshOutcome::Skipped;
        }
        self.set_state(RefreshState::Refreshing);

        let outcome = match self.pull_and_install().await {
            Some((version, persisted)) => RefreshOutcome::Installed {
                version: version.version(),
                records: version.snapshot.len(),
                persisted,
            },
            None => RefreshOutcome::Failed {
                reason: self.counters.lock().last_error.clone().unwrap_or_default(),
            },
        };

        self.set_state(RefreshState::Ready);
        outcome
    }

    /// Refresh every `refresh_interval` on a background task until
    /// `shutdown` turns true or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; bootstrap already loaded.
            ticker.tick().await;

            log::info!(
                "[Refresh] Background refresh every {}s",
                self.refresh_interval.as_secs()
            );

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        self.refresh_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            log::info!("[Refresh] Shutdown requested, background refresh stopped");
        })
    }

    async fn load_mirror(&self) -> Option<Snapshot> {
        let mirror = self.mirror.clone();
        match tokio::task::spawn_blocking(move || mirror.load()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                log::warn!("[Refresh] Ignoring unreadable mirror {}: {}", self.mirror.path().display(), e);
                None
            }
            Err(e) => {
                log::warn!("[Refresh] Mirror load task failed: {}", e);
                None
            }
        }
    }

    /// Pull, install and persist. `None` when the pull failed; the failure
    /// is recorded in the counters.
    async fn pull_and_install(&self) -> Option<(Arc<CatalogVersion>, bool)> {
        self.counters.lock().attempted += 1;
        let start = Instant::now();

        match self.pull().await {
            Ok(snapshot) => {
                let version = self.install(snapshot);
                let persisted = self.persist(&version).await;
                {
                    let mut counters = self.counters.lock();
                    counters.succeeded += 1;
                    counters.last_success = Some(Utc::now());
                }
                log::info!(
                    "[Refresh] Loaded {} products from {} in {:.2}s (version {})",
                    version.snapshot.len(),
                    self.source.name(),
                    start.elapsed().as_secs_f64(),
                    version.version()
                );
                Some((version, persisted))
            }
            Err(e) => {
                log::error!("[Refresh] Pull from {} failed: {}", self.source.name(), e);
                let mut counters = self.counters.lock();
                counters.failed += 1;
                counters.last_error = Some(e.to_string());
                counters.last_error_at = Some(Utc::now());
                None
            }
        }
    }

    /// True while a blocking fetch has not returned yet.
    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight.load(Ordering::Acquire)
    }

    async fn pull(&self) -> Result<Snapshot> {
        if self.fetch_in_flight.swap(true, Ordering::AcqRel) {
            return Err(Error::source_unavailable("previous pull still running"));
        }
        let in_flight = FetchGuard(self.fetch_in_flight.clone());

        let source = self.source.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<Snapshot> {
            let _in_flight = in_flight;
            let rows = source.fetch_all()?;
            let (records, defaulted) = normalize_rows(&rows);
            if defaulted > 0 {
                log::debug!("[Refresh] {} column values defaulted while normalizing {} rows", defaulted, rows.len());
            }
            Ok(Snapshot::new(records, SnapshotOrigin::Source))
        });

        Ok(tokio::time::timeout(self.source_timeout, task).await???)
    }

    fn install(&self, snapshot: Snapshot) -> Arc<CatalogVersion> {
        let indexes = IndexSet::build_with(&snapshot, &self.tokenizer);
        if !indexes.duplicates.is_empty() {
            log::warn!(
                "[Refresh] Duplicate keys, later rows win: {} ids {:?}, {} SKUs {:?}",
                indexes.duplicates.ids.len(),
                indexes.duplicates.ids,
                indexes.duplicates.skus.len(),
                indexes.duplicates.skus
            );
        }
        self.store.install(snapshot, indexes)
    }

    async fn persist(&self, version: &Arc<CatalogVersion>) -> bool {
        if !self.persist_mirror {
            return false;
        }

        let mirror = self.mirror.clone();
        let version = version.clone();
        match tokio::task::spawn_blocking(move || mirror.save(&version.snapshot)).await {
            Ok(Ok(bytes)) => {
                log::debug!("[Refresh] Mirror written ({} bytes)", bytes);
                true
            }
            Ok(Err(e)) => {
                log::error!("[Refresh] Could not write mirror {}: {}", self.mirror.path().display(), e);
                false
            }
            Err(e) => {
                log::error!("[Refresh] Mirror write task failed: {}", e);
                false
            }
        }
    }

    fn set_state(&self, state: RefreshState) {
        *self.state.lock() = state;
    }
}
