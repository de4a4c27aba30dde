use std::fs;
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use serde_json::Value;
use crate::core::error::{Error, Result};
use crate::core::types::{ProductRecord, SourceRow};

/// The source-of-truth product table.
///
/// `fetch_all` is a blocking bulk read of every row, in primary-key order.
/// It runs on the blocking pool under a timeout, never on a query path.
pub trait ProductSource: Send + Sync {
    fn name(&self) -> &str {
        "source"
    }

    fn fetch_all(&self) -> Result<Vec<SourceRow>>;
}

/// Reads rows from a JSON export of the product table: either a top-level
/// array of rows or an object with a `products` array.
#[derive(Debug, Clone)]
pub struct JsonRowsSource {
    path: PathBuf,
}

impl JsonRowsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonRowsSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProductSource for JsonRowsSource {
    fn name(&self) -> &str {
        "json-export"
    }

    fn fetch_all(&self) -> Result<Vec<SourceRow>> {
        let data = fs::read(&self.path).map_err(|e| {
            Error::source_unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let document: Value = serde_json::from_slice(&data)?;

        let rows = match document {
            Value::Array(rows) => rows,
            Value::Object(mut map) => match map.remove("products").or_else(|| map.remove("records")) {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(Error::source_unavailable(format!(
                        "{} has no products array",
                        self.path.display()
                    )));
                }
            },
            _ => {
                return Err(Error::source_unavailable(format!(
                    "{} is not a product export",
                    self.path.display()
                )));
            }
        };

        let (rows, replaced) = object_rows(rows);
        if replaced > 0 {
            log::warn!("[Source] {} non-object rows in {} read as empty rows", replaced, self.path.display());
        }

        Ok(rows)
    }
}

/// Rows as column maps. A value that is not an object becomes an empty row,
/// which normalizes to an all-default record. Also returns how many values
/// were replaced that way.
pub fn object_rows(values: Vec<Value>) -> (Vec<SourceRow>, usize) {
    let mut replaced = 0;
    let rows = values
        .into_iter()
        .map(|value| match value {
            Value::Object(row) => row,
            _ => {
                replaced += 1;
                SourceRow::new()
            }
        })
        .collect();
    (rows, replaced)
}

/// Normalize rows in parallel, keeping their order. Also returns how many
/// column values had to be defaulted.
pub fn normalize_rows(rows: &[SourceRow]) -> (Vec<ProductRecord>, usize) {
    let normalized: Vec<(ProductRecord, usize)> = rows
        .par_iter()
        .map(ProductRecord::from_row_counted)
        .collect();

    let defaulted = normalized.iter().map(|(_, d)| d).sum();
    let records = normalized.into_iter().map(|(record, _)| record).collect();
    (records, defaulted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_a_bare_array_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, json!([{"id": 1, "SKU": "A"}, "junk", {"id": 2, "SKU": "B"}]).to_string()).unwrap();

        let rows = JsonRowsSource::new(&path).fetch_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2]["SKU"], "B");

        let (records, defaulted) = normalize_rows(&rows);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].sku, "");
        assert!(defaulted > 0);
    }

    #[test]
    fn reads_a_products_object_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, json!({"products": [{"id": 7}]}).to_string()).unwrap();

        assert_eq!(JsonRowsSource::new(&path).fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn missing_export_is_source_unavailable() {
        let err = JsonRowsSource::new("/nonexistent/export.json").fetch_all().unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::SourceUnavailable);
    }

    #[test]
    fn normalization_keeps_row_order() {
        let rows: Vec<SourceRow> = (0..500)
            .map(|i| match json!({"id": i, "SKU": format!("S{}", i)}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();

        let (records, defaulted) = normalize_rows(&rows);
        assert!(records.iter().enumerate().all(|(i, r)| r.id.value() == i as i64));
        assert!(defaulted > 0);
    }
}
