use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::core::error::{Error, ErrorKind, Result};

/// One entry of the sales ranking side file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSku {
    pub sku: String,
    pub total_sold: u64,
}

/// SKU popularity scores loaded from the sales-analysis side file.
///
/// Read-only reference data: loaded once and never refreshed together with
/// the catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct RankingOverlay {
    scores: HashMap<String, u64>,
    by_category: BTreeMap<String, Vec<RankedSku>>,
    top_general: Vec<RankedSku>,
    generated_at: Option<String>,
}

impl RankingOverlay {
    pub fn empty() -> Self {
        RankingOverlay::default()
    }

    /// Load the side file. A missing or malformed file yields an empty
    /// overlay, which turns ranking into a no-op.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(overlay) => {
                log::info!(
                    "[Ranking] Loaded {} scored SKUs across {} categories from {}",
                    overlay.len(),
                    overlay.by_category.len(),
                    path.display()
                );
                overlay
            }
            Err(e) => {
                log::warn!("[Ranking] Ranking disabled, could not load {}: {}", path.display(), e);
                RankingOverlay::empty()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::new(ErrorKind::NotFound, "ranking file does not exist".to_string()));
        }
        let data = fs::read(path)?;
        let value: Value = serde_json::from_slice(&data)?;
        Self::from_json(&value)
    }

    /// Accepts either the batch job's report (`top_por_categoria`,
    /// `top_general`, `fecha_generacion`) or a bare category → entries map.
    pub fn from_json(value: &Value) -> Result<Self> {
        let root = value.as_object().ok_or_else(|| {
            Error::new(ErrorKind::Parse, "ranking document must be an object".to_string())
        })?;

        let categories = match root.get("top_por_categoria") {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(Error::new(
                    ErrorKind::Parse,
                    "top_por_categoria must be an object".to_string(),
                ));
            }
            None => root,
        };

        let mut overlay = RankingOverlay::empty();

        for (category, entries) in categories {
            let Some(entries) = entries.as_array() else {
                continue;
            };
            let mut ranked: Vec<RankedSku> = entries.iter().filter_map(parse_entry).collect();
            ranked.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
            for entry in &ranked {
                overlay.note_score(entry);
            }
            overlay.by_category.insert(category.clone(), ranked);
        }

        if let Some(Value::Array(entries)) = root.get("top_general") {
            let mut ranked: Vec<RankedSku> = entries.iter().filter_map(parse_entry).collect();
            ranked.sort_by(|a, b| b.total_sold.cmp(&a.total_sold));
            for entry in &ranked {
                overlay.note_score(entry);
            }
            overlay.top_general = ranked;
        }

        overlay.generated_at = root
            .get("fecha_generacion")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(overlay)
    }

    pub fn from_scores<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut overlay = RankingOverlay::empty();
        for (sku, total_sold) in scores {
            overlay.note_score(&RankedSku { sku: sku.into(), total_sold });
        }
        overlay
    }

    fn note_score(&mut self, entry: &RankedSku) {
        let score = self.scores.entry(entry.sku.clone()).or_insert(0);
        *score = (*score).max(entry.total_sold);
    }

    /// Popularity score for `sku`, 0 when the SKU was not ranked.
    pub fn score(&self, sku: &str) -> u64 {
        self.scores.get(sku).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn top_for_category(&self, category: &str) -> &[RankedSku] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn top_general(&self) -> &[RankedSku] {
        &self.top_general
    }

    pub fn generated_at(&self) -> Option<&str> {
        self.generated_at.as_deref()
    }
}

fn parse_entry(entry: &Value) -> Option<RankedSku> {
    let obj = entry.as_object()?;
    let sku = obj
        .get("SKU")
        .or_else(|| obj.get("sku"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let total = obj
        .get("total_vendido")
        .or_else(|| obj.get("totalSold"))
        .or_else(|| obj.get("total_sold"))
        .map(parse_count)
        .unwrap_or(0);

    Some(RankedSku {
        sku: sku.to_string(),
        total_sold: total,
    })
}

fn parse_count(value: &Value) -> u64 {
    let count = match value {
        Value::Number(n) => n.as_u64().map(|v| v as f64).or_else(|| n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match count {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}
