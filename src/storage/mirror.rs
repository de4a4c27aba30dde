use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use crate::core::error::Result;
use crate::core::types::ProductRecord;
use crate::refresh::source::{normalize_rows, object_rows};
use crate::snapshot::snapshot::{AggregateStats, Snapshot, SnapshotOrigin};

#[derive(Serialize)]
struct MirrorDocumentRef<'a> {
    products: &'a [ProductRecord],
    last_update: String,
    stats: &'a AggregateStats,
    total_products: usize,
}

#[derive(Deserialize)]
struct MirrorDocument {
    #[serde(default, alias = "records")]
    products: Vec<Value>,
    #[serde(default)]
    last_update: Option<String>,
}

/// JSON copy of the last good snapshot, used to start warm.
#[derive(Debug, Clone)]
pub struct MirrorFile {
    path: PathBuf,
}

impl MirrorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MirrorFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Size of the mirror on disk, 0 when absent.
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Load mirror from disk. `Ok(None)` when no mirror has been written yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        let document: MirrorDocument = serde_json::from_slice(&data)?;

        let (rows, replaced) = object_rows(document.products);
        if replaced > 0 {
            log::warn!("[Mirror] {} mirror rows were not objects, loaded with defaults", replaced);
        }
        let (records, defaulted) = normalize_rows(&rows);
        if defaulted > 0 {
            log::debug!("[Mirror] {} mirror rows needed default values", defaulted);
        }

        let captured_at = document
            .last_update
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        Ok(Some(Snapshot::captured_at(records, SnapshotOrigin::Mirror, captured_at)))
    }

    /// Write `snapshot` next to the target and atomically move it into
    /// place. Returns the number of bytes written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<u64> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let document = MirrorDocumentRef {
            products: &snapshot.records,
            last_update: snapshot.captured_at.to_rfc3339(),
            stats: &snapshot.stats,
            total_products: snapshot.len(),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        let file = tmp.persist(&self.path)?;
        Ok(file.metadata()?.len())
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
