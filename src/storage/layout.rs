use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::Result;

pub const MIRROR_FILE_NAME: &str = "productos_db.json";
pub const RANKING_FILE_NAME: &str = "ventas_analysis.json";

/// Directory structure for catalog files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub mirror_file: PathBuf,   // Last good snapshot
    pub ranking_file: PathBuf,  // Sales analysis written by the batch job
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();

        // Create directories
        fs::create_dir_all(&base_dir)?;

        Ok(StorageLayout {
            mirror_file: base_dir.join(MIRROR_FILE_NAME),
            ranking_file: base_dir.join(RANKING_FILE_NAME),
            base_dir,
        })
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_file
    }

    pub fn ranking_path(&self) -> &Path {
        &self.ranking_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_the_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("nested").join("database")).unwrap();

        assert!(layout.base_dir.is_dir());
        assert!(layout.mirror_path().ends_with("productos_db.json"));
        assert!(layout.ranking_path().ends_with("ventas_analysis.json"));
    }
}
