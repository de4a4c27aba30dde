use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::core::types::{ProductRecord, StockStatus};

/// Where the records of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Empty,
    Source,
    Mirror,
    Placeholder,
}

impl SnapshotOrigin {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SnapshotOrigin::Empty | SnapshotOrigin::Placeholder)
    }
}

/// Lowest, highest and mean of one price column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Aggregates computed once per snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_products: usize,
    pub categories: BTreeMap<String, usize>,
    #[serde(default)]
    pub subcategories: BTreeMap<String, usize>,
    /// Keyed by the stock label as stored in the source.
    #[serde(default)]
    pub stock: BTreeMap<String, usize>,
    /// `None` for an empty snapshot.
    #[serde(default)]
    pub price_b: Option<PriceRange>,
}

impl AggregateStats {
    pub fn compute(records: &[ProductRecord]) -> Self {
        let mut stats = AggregateStats {
            total_products: records.len(),
            ..Default::default()
        };
        let mut price_sum = 0.0;

        for record in records {
            *stats.categories.entry(record.category.clone()).or_insert(0) += 1;
            *stats.subcategories.entry(record.subcategory.clone()).or_insert(0) += 1;
            *stats.stock.entry(record.stock.as_str().to_string()).or_insert(0) += 1;

            let price = record.price_b;
            price_sum += price;
            stats.price_b = Some(match stats.price_b {
                None => PriceRange { min: price, max: price, avg: 0.0 },
                Some(range) => PriceRange {
                    min: range.min.min(price),
                    max: range.max.max(price),
                    avg: 0.0,
                },
            });
        }

        if let Some(range) = stats.price_b.as_mut() {
            range.avg = price_sum / records.len() as f64;
        }
        stats
    }
}

/// Immutable copy of the catalog at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub records: Vec<ProductRecord>,
    pub captured_at: DateTime<Utc>,
    pub stats: AggregateStats,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    pub fn new(records: Vec<ProductRecord>, origin: SnapshotOrigin) -> Self {
        Self::captured_at(records, origin, Utc::now())
    }

    pub fn captured_at(
        records: Vec<ProductRecord>,
        origin: SnapshotOrigin,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let stats = AggregateStats::compute(&records);
        Snapshot {
            version: 0,
            records,
            captured_at,
            stats,
            origin,
        }
    }

    /// Single demo record served when neither the mirror nor the source
    /// could be read, so callers still get a well-formed catalog.
    pub fn placeholder() -> Self {
        let record = ProductRecord {
            model: "DEMO".to_string(),
            size: "750ml".to_string(),
            category: "DEMO".to_string(),
            subcategory: "demo".to_string(),
            stock: StockStatus::OutOfStock,
            description: "Catalog source unavailable; showing placeholder data".to_string(),
            ..ProductRecord::new(1, "DEMO001", "Producto Demo")
        };
        Snapshot::new(vec![record], SnapshotOrigin::Placeholder)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::new(Vec::new(), SnapshotOrigin::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_records_per_category() {
        let mut a = ProductRecord::new(1, "A", "a");
        a.category = "CERVEZA".into();
        let mut b = ProductRecord::new(2, "B", "b");
        b.category = "CERVEZA".into();
        let mut c = ProductRecord::new(3, "C", "c");
        c.category = "RON".into();

        let snapshot = Snapshot::new(vec![a, b, c], SnapshotOrigin::Source);
        assert_eq!(snapshot.stats.total_products, 3);
        assert_eq!(snapshot.stats.categories["CERVEZA"], 2);
        assert_eq!(snapshot.stats.categories["RON"], 1);
    }

    #[test]
    fn stats_cover_subcategories_stock_and_prices() {
        let priced = |id: i64, sub: &str, stock: StockStatus, price_b: f64| ProductRecord {
            subcategory: sub.to_string(),
            stock,
            price_b,
            ..ProductRecord::new(id, &format!("S{}", id), "x")
        };
        let snapshot = Snapshot::new(
            vec![
                priced(1, "Cervezas", StockStatus::InStock, 5.5),
                priced(2, "Cervezas", StockStatus::OutOfStock, 4.0),
                priced(3, "Rones", StockStatus::InStock, 42.5),
                priced(4, "Rones", StockStatus::Other("Por llegar".into()), 8.0),
            ],
            SnapshotOrigin::Source,
        );

        let stats = &snapshot.stats;
        assert_eq!(stats.subcategories["Cervezas"], 2);
        assert_eq!(stats.subcategories["Rones"], 2);
        assert_eq!(stats.stock["Con Stock"], 2);
        assert_eq!(stats.stock["Sin Stock"], 1);
        assert_eq!(stats.stock["Por llegar"], 1);

        let prices = stats.price_b.unwrap();
        assert_eq!(prices.min, 4.0);
        assert_eq!(prices.max, 42.5);
        assert_eq!(prices.avg, 15.0);
    }

    #[test]
    fn empty_snapshot_has_no_price_range() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.stats.total_products, 0);
        assert!(snapshot.stats.price_b.is_none());
        assert!(snapshot.stats.stock.is_empty());
    }

    #[test]
    fn placeholder_is_degraded_single_record() {
        let snapshot = Snapshot::placeholder();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records[0].sku, "DEMO001");
        assert!(snapshot.origin.is_degraded());
    }
}
