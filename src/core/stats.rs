use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::query::cache::CacheStats;
use crate::refresh::coordinator::{RefreshCounters, RefreshState};
use crate::snapshot::snapshot::{PriceRange, SnapshotOrigin};

/// Catalog statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    // Snapshot
    pub total_products: usize,
    pub category_count: usize,
    pub last_update: DateTime<Utc>,
    pub snapshot_version: u64,
    pub origin: SnapshotOrigin,
    pub duplicate_ids: usize,
    pub duplicate_skus: usize,

    // Breakdown
    pub products_by_category: BTreeMap<String, usize>,
    pub products_by_subcategory: BTreeMap<String, usize>,
    pub products_by_stock: BTreeMap<String, usize>,
    pub price_b: Option<PriceRange>,

    // Storage
    pub mirror_size_bytes: u64,
    pub indexes_built: usize,
    pub ranked_skus: usize,

    // Queries
    pub last_query_us: u64,
    pub queries_served: u64,
    pub cache_stats: CacheStats,

    // Refresh
    pub refresh_state: RefreshState,
    pub refresh: RefreshCounters,
}

impl CatalogStats {
    pub fn mirror_size_mb(&self) -> f64 {
        self.mirror_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }

    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded(_) => 1,
            HealthStatus::Unhealthy(_) => 2,
        }
    }
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Overall status is the worst status among `checks`.
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|check| &check.status)
            .max_by_key(|status| status.severity())
            .cloned()
            .unwrap_or(HealthStatus::Healthy);

        HealthCheckResult {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn new(name: &str, status: HealthStatus, message: Option<String>) -> Self {
        HealthCheck {
            name: name.to_string(),
            status,
            message,
        }
    }
}
