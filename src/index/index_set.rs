use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use crate::core::types::{ProductId, StockStatus};
use crate::index::tokenizer::NameTokenizer;
use crate::snapshot::snapshot::Snapshot;

/// Position of a record inside its snapshot.
pub type Position = u32;

/// Rank used for subcategories whose display rank is not a number.
pub const UNRANKED: i64 = 999;

/// Number of lookup maps an [`IndexSet`] carries.
pub const INDEX_COUNT: usize = 8;

const EMPTY_BUCKET: &[Position] = &[];

/// Separator between fields of the extended search text. Never produced by
/// a trimmed, lowercased product field.
const FIELD_SEPARATOR: &str = "\u{1f}";

/// Row of the subcategory summary, precomputed per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcategorySummary {
    pub subcategory: String,
    pub display_rank: i64,
    pub total_count: usize,
    pub in_stock_count: usize,
}

/// Keys seen more than once while building. The later record wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateReport {
    pub ids: Vec<ProductId>,
    pub skus: Vec<String>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.skus.is_empty()
    }
}

/// Lookup structures derived from one snapshot. Buckets hold positions in
/// snapshot order and are never modified after [`IndexSet::build`].
#[derive(Debug, Clone, Default)]
pub struct IndexSet {
    pub by_id: HashMap<ProductId, Position>,
    pub by_sku: HashMap<String, Position>,
    pub by_category: HashMap<String, Vec<Position>>,
    pub by_subcategory: HashMap<String, Vec<Position>>,
    pub by_stock: HashMap<StockStatus, Vec<Position>>,
    pub by_size: HashMap<String, Vec<Position>>,
    pub by_name: HashMap<String, Vec<Position>>,
    pub by_name_token: HashMap<String, Vec<Position>>,
    name_text: Vec<String>,
    extended_text: Vec<String>,
    subcategory_summary: Vec<SubcategorySummary>,
    pub duplicates: DuplicateReport,
}

impl IndexSet {
    pub fn build(snapshot: &Snapshot) -> Self {
        Self::build_with(snapshot, &NameTokenizer::default())
    }

    pub fn build_with(snapshot: &Snapshot, tokenizer: &NameTokenizer) -> Self {
        let count = snapshot.records.len();
        let mut index = IndexSet {
            by_id: HashMap::with_capacity(count),
            by_sku: HashMap::with_capacity(count),
            name_text: Vec::with_capacity(count),
            extended_text: Vec::with_capacity(count),
            ..Default::default()
        };

        let mut summary_slots: HashMap<String, usize> = HashMap::new();

        for (i, record) in snapshot.records.iter().enumerate() {
            let pos = i as Position;

            if index.by_id.insert(record.id, pos).is_some() {
                index.duplicates.ids.push(record.id);
            }
            if index.by_sku.insert(record.sku.clone(), pos).is_some() {
                index.duplicates.skus.push(record.sku.clone());
            }

            index.by_category.entry(record.category.clone()).or_default().push(pos);
            index.by_subcategory.entry(record.subcategory.clone()).or_default().push(pos);
            index.by_stock.entry(record.stock.clone()).or_default().push(pos);
            index.by_size.entry(record.size.clone()).or_default().push(pos);

            let folded_name = record.name.to_lowercase();
            index.by_name.entry(folded_name.clone()).or_default().push(pos);
            for token in tokenizer.unique_tokens(&record.name) {
                index.by_name_token.entry(token).or_default().push(pos);
            }

            let folded_sku = record.sku.to_lowercase();
            let extended = [
                folded_name.clone(),
                folded_sku.clone(),
                record.model.to_lowercase(),
                record.category.to_lowercase(),
                record.subcategory.to_lowercase(),
            ]
            .join(FIELD_SEPARATOR);
            index.extended_text.push(extended);
            index.name_text.push([folded_name, folded_sku].join(FIELD_SEPARATOR));

            let slot = *summary_slots
                .entry(record.subcategory.clone())
                .or_insert_with(|| {
                    index.subcategory_summary.push(SubcategorySummary {
                        subcategory: record.subcategory.clone(),
                        display_rank: parse_display_rank(&record.subcategory_rank),
                        total_count: 0,
                        in_stock_count: 0,
                    });
                    index.subcategory_summary.len() - 1
                });
            let row = &mut index.subcategory_summary[slot];
            row.total_count += 1;
            if record.stock.is_in_stock() {
                row.in_stock_count += 1;
            }
        }

        index.subcategory_summary.sort_by(|a, b| {
            a.display_rank
                .cmp(&b.display_rank)
                .then_with(|| a.subcategory.cmp(&b.subcategory))
        });

        index
    }

    pub fn position_of_id(&self, id: ProductId) -> Option<Position> {
        self.by_id.get(&id).copied()
    }

    pub fn position_of_sku(&self, sku: &str) -> Option<Position> {
        self.by_sku.get(sku).copied()
    }

    pub fn category(&self, category: &str) -> &[Position] {
        bucket(&self.by_category, category)
    }

    pub fn subcategory(&self, subcategory: &str) -> &[Position] {
        bucket(&self.by_subcategory, subcategory)
    }

    pub fn size(&self, size: &str) -> &[Position] {
        bucket(&self.by_size, size)
    }

    pub fn stock(&self, status: &StockStatus) -> &[Position] {
        self.by_stock.get(status).map(Vec::as_slice).unwrap_or(EMPTY_BUCKET)
    }

    /// Records whose lowercased name equals `name` lowercased.
    pub fn exact_name(&self, name: &str) -> &[Position] {
        bucket(&self.by_name, &name.trim().to_lowercase())
    }

    pub fn name_token(&self, token: &str) -> &[Position] {
        bucket(&self.by_name_token, token)
    }

    /// Lowercased searchable text for a position: name and SKU, plus model,
    /// category and subcategory when `extended`.
    pub fn search_text(&self, pos: Position, extended: bool) -> &str {
        let texts = if extended { &self.extended_text } else { &self.name_text };
        texts.get(pos as usize).map(String::as_str).unwrap_or("")
    }

    pub fn subcategory_summary(&self) -> &[SubcategorySummary] {
        &self.subcategory_summary
    }

    pub fn index_count(&self) -> usize {
        INDEX_COUNT
    }
}

fn bucket<'a>(map: &'a HashMap<String, Vec<Position>>, key: &str) -> &'a [Position] {
    map.get(key).map(Vec::as_slice).unwrap_or(EMPTY_BUCKET)
}

/// Numeric display rank, or [`UNRANKED`] for anything that is not a number.
pub fn parse_display_rank(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(rank) = raw.parse::<i64>() {
        return rank;
    }
    match raw.parse::<f64>() {
        Ok(rank) if rank.is_finite() => rank.round() as i64,
        _ => UNRANKED,
    }
}

/// Intersection of sorted position lists, keeping snapshot order.
pub fn intersect_sorted(lists: &[&[Position]]) -> Vec<Position> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    let mut result: Vec<Position> = first.to_vec();
    for list in rest {
        let mut kept = Vec::with_capacity(result.len().min(list.len()));
        let (mut i, mut j) = (0, 0);
        while i < result.len() && j < list.len() {
            match result[i].cmp(&list[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    kept.push(result[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        result = kept;
        if result.is_empty() {
            break;
        }
    }
    result
}
