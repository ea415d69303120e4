//! Error type shared by the readers, transforms and writers in this crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, transforming or writing a [`GeoTable`](crate::GeoTable).
#[derive(Debug, Error)]
pub enum GeoTableError {
    /// The shapefile geometry stream (`.shp`) could not be read.
    #[error("Failed to read shapefile '{path}': {source}")]
    Shapefile {
        /// The `.shp` path being read
        path: PathBuf,
        /// The underlying reader error
        #[source]
        source: shapefile::Error,
    },

    /// The dBase attribute table (`.dbf`) could not be read.
    #[error("Failed to read attribute table '{path}': {source}")]
    Dbase {
        /// The `.dbf` path being read
        path: PathBuf,
        /// The underlying reader error
        #[source]
        source: shapefile::dbase::Error,
    },

    /// The shapefile has no `.dbf` sidecar.
    #[error("Attribute table not found next to '{path}'")]
    MissingAttributeTable {
        /// The `.shp` path whose sidecar is missing
        path: PathBuf,
    },

    /// Geometry and attribute record counts disagree.
    #[error("Shapefile '{path}' has {shapes} shapes but {records} attribute records")]
    RecordCountMismatch {
        /// The `.shp` path
        path: PathBuf,
        /// Number of shapes in `.shp`
        shapes: usize,
        /// Number of records in `.dbf`
        records: usize,
    },

    /// A shape could not be converted into a `geo` geometry.
    #[error("Invalid geometry at record {index}: {message}")]
    InvalidGeometry {
        /// Zero-based record index
        index: usize,
        /// Description of the problem
        message: String,
    },

    /// A column referenced by name does not exist.
    #[error("Column '{name}' not found. Available columns: {available}")]
    ColumnNotFound {
        /// The requested column
        name: String,
        /// Comma-separated list of existing columns
        available: String,
    },

    /// A column exists but has a type the operation cannot handle.
    #[error("Column '{name}' has incompatible type: expected {expected}, found {found}")]
    ColumnType {
        /// The column name
        name: String,
        /// Expected type
        expected: String,
        /// Actual type found
        found: String,
    },

    /// Two columns would share a name in the output.
    #[error("Column '{name}' already exists")]
    DuplicateColumn {
        /// The clashing column name
        name: String,
    },

    /// A GeoParquet file is missing its geometry column or `geo` metadata.
    #[error("Invalid GeoParquet file '{path}': {message}")]
    InvalidGeoParquet {
        /// The file being read
        path: PathBuf,
        /// Description of the problem
        message: String,
    },

    /// No transformation exists between the two reference systems.
    #[error("Cannot reproject from {from} to {to}")]
    UnsupportedReprojection {
        /// Source CRS label
        from: String,
        /// Target CRS label
        to: String,
    },

    /// The projection library rejected a coordinate or definition.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Geometry could not be encoded as WKB.
    #[error("WKB encoding failed: {0}")]
    Wkb(#[from] geozero::error::GeozeroError),

    /// Arrow kernel or batch construction failure.
    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Parquet encoding failure.
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    /// `geo` metadata could not be serialized.
    #[error("Failed to serialize GeoParquet metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Filesystem failure with path context.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The path being accessed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeoTableError>;

impl GeoTableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
