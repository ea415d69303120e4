//! Data types describing local datasets.
//!
//! These structures are produced by [`inspect_dataset`](crate::info::inspect_dataset)
//! and rendered by the CLI.

/// Information about a dataset.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Path to the dataset
    pub dataset: String,
    /// Driver name
    pub driver: String,
    /// Driver long name
    pub driver_long_name: String,
    /// Number of rows
    pub row_count: usize,
    /// Geometry columns information
    pub geometry_columns: Vec<GeometryColumnInfo>,
    /// Schema fields
    pub fields: Vec<FieldInfo>,
}

/// Information about a geometry column.
#[derive(Debug, Clone)]
pub struct GeometryColumnInfo {
    /// Column name
    pub name: String,
    /// Encoding (e.g., "WKB")
    pub encoding: String,
    /// Geometry type names found in the column
    pub geometry_types: Vec<String>,
    /// Extension name (e.g., "geoarrow.wkb")
    pub extension: Option<String>,
    /// CRS information
    pub crs: Option<String>,
    /// Bounding box as `[xmin, ymin, xmax, ymax]`
    pub bbox: Option<Vec<f64>>,
}

/// Information about a field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Data type
    pub data_type: String,
    /// Whether the field is nullable
    pub nullable: bool,
}
