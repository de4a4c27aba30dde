#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;

use vitrina::core::catalog::Catalog;
use vitrina::core::config::Config;
use vitrina::core::error::{Error, Result};
use vitrina::core::types::SourceRow;
use vitrina::ranking::overlay::RankingOverlay;
use vitrina::refresh::source::ProductSource;

/// In-memory product table whose contents and availability tests control.
pub struct ScriptedSource {
    rows: Mutex<Option<Vec<SourceRow>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_rows(rows: Vec<SourceRow>) -> Arc<Self> {
        Arc::new(ScriptedSource {
            rows: Mutex::new(Some(rows)),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(ScriptedSource {
            rows: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_rows(&self, rows: Vec<SourceRow>) {
        *self.rows.lock() = Some(rows);
    }

    pub fn fail(&self) {
        *self.rows.lock() = None;
    }

    pub fn stall(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProductSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_all(&self) -> Result<Vec<SourceRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.rows
            .lock()
            .clone()
            .ok_or_else(|| Error::source_unavailable("connection refused"))
    }
}

pub fn setup_temp_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        storage_path: dir.path().join("database"),
        refresh_interval_secs: 1,
        source_timeout_secs: 1,
        ..Config::default()
    }
}

pub fn row(id: i64, sku: &str, name: &str, category: &str, subcategory: &str, rank: &str, stock: &str) -> SourceRow {
    let value = json!({
        "id": id,
        "SKU": sku,
        "Nombre": name,
        "Modelo": "",
        "Tamaño": "620ml",
        "Precio B": 5.5,
        "Precio J": "6.00",
        "Categoria": category,
        "Sub Categoria": subcategory,
        "Sub Categoria Nivel": rank,
        "Stock": stock,
        "Descripcion": null,
        "Al Por Mayor": 0,
        "Cantidad": 12,
        "Photo": "",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Five beers, two rums and a mixer, mixed stock.
pub fn catalog_rows() -> Vec<SourceRow> {
    vec![
        row(1, "B1", "Pilsen Callao", "CERVEZA", "Cervezas", "2", "Con Stock"),
        row(2, "B2", "Cusqueña Dorada", "CERVEZA", "Cervezas", "2", "Con Stock"),
        row(3, "R1", "Ron Cartavio Black", "RON", "Rones", "1", "Con Stock"),
        row(4, "B3", "Cristal", "CERVEZA", "Cervezas", "2", "Sin Stock"),
        row(5, "B7", "Cusqueña Trigo", "CERVEZA", "Cervezas", "2", "Con Stock"),
        row(6, "R2", "Ron Pomalca", "RON", "Rones", "1", "Sin Stock"),
        row(7, "B9", "Pilsen Callao Lata", "CERVEZA", "Cervezas Lata", "3", "Con Stock"),
        row(8, "M1", "Agua Tónica", "", "Mixers", "", "Con Stock"),
    ]
}

pub async fn open_catalog(dir: &TempDir, source: Arc<ScriptedSource>) -> Catalog {
    Catalog::open_with_ranking(test_config(dir), source, RankingOverlay::empty())
        .await
        .expect("open catalog")
}
