//! On-disk layout of raw and processed data.

use std::path::{Path, PathBuf};

use crate::error::{Result, create_dir_all};
use crate::sources::TabularSource;

/// Default directory for downloads and scratch space.
pub const DEFAULT_RAW_DIR: &str = "data/raw";

/// Default directory for GeoParquet outputs.
pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";

/// Extension of processed outputs.
pub const PROCESSED_EXTENSION: &str = "parquet";

/// Where every file handled by `civicetl` lives.
///
/// ```text
/// <raw>/boston-311-2019.csv          tabular downloads
/// <raw>/<name>.zip                   transient archives
/// <raw>/<name>/                      transient extraction directories
/// <processed>/<name>.parquet         GeoParquet outputs
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_DIR, DEFAULT_PROCESSED_DIR)
    }
}

impl DataLayout {
    /// Creates a layout rooted at the two directories.
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    /// Directory for downloads and scratch space.
    #[must_use]
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Directory for processed outputs.
    #[must_use]
    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Local path of a tabular download.
    #[must_use]
    pub fn tabular_path(&self, source: &TabularSource) -> PathBuf {
        self.raw_dir.join(source.file_name())
    }

    /// Local path of a downloaded archive.
    #[must_use]
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.raw_dir.join(format!("{name}.zip"))
    }

    /// Extraction directory for an archive.
    #[must_use]
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        self.raw_dir.join(name)
    }

    /// Path of a processed output.
    #[must_use]
    pub fn processed_path(&self, name: &str) -> PathBuf {
        self.processed_dir
            .join(format!("{name}.{PROCESSED_EXTENSION}"))
    }

    /// A tabular file counts as present when it exists and is non-empty.
    #[must_use]
    pub fn tabular_present(&self, source: &TabularSource) -> bool {
        std::fs::metadata(self.tabular_path(source)).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// A processed output counts as present when it exists.
    #[must_use]
    pub fn processed_present(&self, name: &str) -> bool {
        self.processed_path(name).exists()
    }

    /// Creates the raw directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn ensure_raw_dir(&self) -> Result<()> {
        create_dir_all(&self.raw_dir)
    }

    /// Creates the processed directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn ensure_processed_dir(&self) -> Result<()> {
        create_dir_all(&self.processed_dir)
    }
}
