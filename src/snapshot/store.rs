use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use crate::core::types::{ProductRecord, ProductId};
use crate::index::index_set::{IndexSet, Position};
use crate::snapshot::snapshot::Snapshot;

/// A snapshot together with the indexes built from it. Installed and
/// discarded as one unit.
#[derive(Debug)]
pub struct CatalogVersion {
    pub snapshot: Snapshot,
    pub indexes: IndexSet,
}

impl CatalogVersion {
    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    pub fn record(&self, pos: Position) -> Option<&ProductRecord> {
        self.snapshot.records.get(pos as usize)
    }

    pub fn by_id(&self, id: ProductId) -> Option<&ProductRecord> {
        self.indexes.position_of_id(id).and_then(|pos| self.record(pos))
    }

    pub fn by_sku(&self, sku: &str) -> Option<&ProductRecord> {
        self.indexes.position_of_sku(sku).and_then(|pos| self.record(pos))
    }

    /// Owned copies of the records at `positions`, in the given order.
    pub fn collect(&self, positions: &[Position]) -> Vec<ProductRecord> {
        positions
            .iter()
            .filter_map(|&pos| self.record(pos))
            .cloned()
            .collect()
    }
}

/// Holds the current catalog version.
///
/// Readers clone the `Arc` and keep whatever version they fetched; the
/// pointer swap in [`SnapshotStore::install`] is the only write.
pub struct SnapshotStore {
    current: RwLock<Arc<CatalogVersion>>,
    next_version: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let empty = Snapshot::default();
        let indexes = IndexSet::build(&empty);
        SnapshotStore {
            current: RwLock::new(Arc::new(CatalogVersion { snapshot: empty, indexes })),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> Arc<CatalogVersion> {
        self.current.read().clone()
    }

    /// Stamp the next version number on `snapshot` and make the pair current.
    pub fn install(&self, mut snapshot: Snapshot, indexes: IndexSet) -> Arc<CatalogVersion> {
        snapshot.version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let version = Arc::new(CatalogVersion { snapshot, indexes });

        let previous = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, version.clone())
        };

        log::debug!(
            "[SnapshotStore] Installed version {} ({} records), replaced version {}",
            version.version(),
            version.snapshot.len(),
            previous.version()
        );

        version
    }

    pub fn current_version(&self) -> u64 {
        self.current.read().version()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        SnapshotStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::snapshot::SnapshotOrigin;

    fn snapshot_of(skus: &[&str]) -> Snapshot {
        let records = skus
            .iter()
            .enumerate()
            .map(|(i, sku)| ProductRecord::new(i as i64 + 1, sku, sku))
            .collect();
        Snapshot::new(records, SnapshotOrigin::Source)
    }

    fn install(store: &SnapshotStore, snapshot: Snapshot) -> Arc<CatalogVersion> {
        let indexes = IndexSet::build(&snapshot);
        store.install(snapshot, indexes)
    }

    #[test]
    fn starts_empty_at_version_zero() {
        let store = SnapshotStore::new();
        let current = store.current();
        assert_eq!(current.version(), 0);
        assert!(current.snapshot.is_empty());
        assert_eq!(current.snapshot.origin, SnapshotOrigin::Empty);
    }

    #[test]
    fn install_bumps_version_and_swaps() {
        let store = SnapshotStore::new();
        let first = install(&store, snapshot_of(&["A"]));
        let second = install(&store, snapshot_of(&["B", "C"]));

        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(store.current_version(), 2);
        assert!(store.current().by_sku("B").is_some());
    }

    #[test]
    fn held_versions_survive_a_swap() {
        let store = SnapshotStore::new();
        install(&store, snapshot_of(&["OLD"]));
        let held = store.current();

        install(&store, snapshot_of(&["NEW"]));

        assert!(held.by_sku("OLD").is_some());
        assert!(held.by_sku("NEW").is_none());
        assert!(store.current().by_sku("NEW").is_some());
    }

    #[test]
    fn concurrent_readers_see_whole_versions() {
        let store = Arc::new(SnapshotStore::new());
        install(&store, snapshot_of(&["A0", "A1"]));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let version = store.current();
                        assert_eq!(version.snapshot.len(), version.indexes.by_sku.len());
                    }
                })
            })
            .collect();

        for round in 0..50 {
            let skus: Vec<String> = (0..(round % 5 + 1)).map(|i| format!("S{}-{}", round, i)).collect();
            let refs: Vec<&str> = skus.iter().map(String::as_str).collect();
            install(&store, snapshot_of(&refs));
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
