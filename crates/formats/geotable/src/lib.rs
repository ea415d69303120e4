//! `geotable` holds vector features in memory as an Arrow attribute table plus
//! `geo` geometries, and provides the handful of GIS operations needed to turn
//! published boundary files into GeoParquet:
//!
//! - [`read_shapefile`]: load `.shp`/`.dbf`/`.prj` into a [`GeoTable`]
//! - [`GeoTable::to_crs`] and [`Crs`]: recognise and reproject coordinate systems
//! - [`sjoin`]: predicate-based spatial join
//! - [`write_geoparquet`] / [`read_geoparquet`]: GeoParquet 1.1 I/O

pub mod crs;
pub mod error;
pub mod geoparquet;
pub mod join;
pub mod reader;
pub mod table;

pub use crs::{Crs, Transformer};
pub use error::{GeoTableError, Result};
pub use geoparquet::{
    GEOMETRY_COLUMN, GeoParquetColumn, GeoParquetMetadata, read_geoparquet,
    read_geoparquet_metadata, write_geoparquet,
};
pub use join::{JOIN_INDEX_COLUMN, Predicate, sjoin};
pub use reader::read_shapefile;
pub use table::GeoTable;
