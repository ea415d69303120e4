//! GeoParquet 1.1 writer and reader.
//!
//! Geometries are stored WKB-encoded in a binary column tagged with the
//! `geoarrow.wkb` extension type, and described by the `geo` key of the
//! Parquet footer.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BinaryBuilder};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatchReader;
use arrow_schema::{DataType, Field, Schema};
use geo::BoundingRect;
use geo_types::{Coord, Geometry, Rect};
use geoarrow_array::GeoArrowArray;
use geoarrow_array::array::WkbArray;
use geoarrow_schema::WkbType;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToGeo, ToWkb};
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::format::KeyValue;
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;

use crate::crs::Crs;
use crate::error::{GeoTableError, Result};
use crate::table::{GeoTable, batch_with_row_count};

/// Name of the geometry column written by [`write_geoparquet`].
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Footer key holding the GeoParquet metadata document.
pub const GEO_METADATA_KEY: &str = "geo";

const GEOPARQUET_VERSION: &str = "1.1.0";

/// The `geo` footer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoParquetMetadata {
    /// GeoParquet specification version.
    pub version: String,
    /// Name of the default geometry column.
    pub primary_column: String,
    /// Per-column geometry descriptions.
    pub columns: BTreeMap<String, GeoParquetColumn>,
}

/// Description of one geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoParquetColumn {
    /// Always `WKB` for files written by this crate.
    pub encoding: String,
    /// Distinct geometry type names present in the column.
    pub geometry_types: Vec<String>,
    /// `[xmin, ymin, xmax, ymax]` over all non-null geometries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    /// PROJJSON definition.
    ///
    /// `None` means the key is absent (OGC:CRS84); `Some(Value::Null)` means the
    /// CRS is explicitly unknown.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub crs: Option<serde_json::Value>,
}

fn present<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(d).map(Some)
}

impl GeoParquetColumn {
    /// CRS described by this column.
    #[must_use]
    pub fn crs(&self) -> Crs {
        match &self.crs {
            None => Crs::from_epsg(4326),
            Some(serde_json::Value::Null) => Crs::unknown(),
            Some(value) => Crs::from_projjson(value),
        }
    }
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

fn total_bounds(geometry: &[Option<Geometry<f64>>]) -> Option<Rect<f64>> {
    geometry
        .iter()
        .flatten()
        .filter_map(|g| g.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

fn build_metadata(table: &GeoTable) -> GeoParquetMetadata {
    let geometry_types: BTreeSet<&str> = table
        .geometry()
        .iter()
        .flatten()
        .map(geometry_type_name)
        .collect();
    let crs = Some(table.crs().to_projjson().unwrap_or(serde_json::Value::Null));
    let column = GeoParquetColumn {
        encoding: "WKB".to_string(),
        geometry_types: geometry_types.into_iter().map(str::to_string).collect(),
        bbox: total_bounds(table.geometry())
            .map(|r| vec![r.min().x, r.min().y, r.max().x, r.max().y]),
        crs,
    };
    GeoParquetMetadata {
        version: GEOPARQUET_VERSION.to_string(),
        primary_column: GEOMETRY_COLUMN.to_string(),
        columns: BTreeMap::from([(GEOMETRY_COLUMN.to_string(), column)]),
    }
}

fn encode_geometry(geometry: &[Option<Geometry<f64>>]) -> Result<(Field, ArrayRef)> {
    let mut builder = BinaryBuilder::with_capacity(geometry.len(), geometry.len() * 64);
    for geom in geometry {
        match geom {
            Some(g) => builder.append_value(g.to_wkb(CoordDimensions::xy())?),
            None => builder.append_null(),
        }
    }
    let wkb = WkbArray::from((builder.finish(), WkbType::new(Arc::default())));
    let field = wkb.data_type().to_field(GEOMETRY_COLUMN, true);
    Ok((field, wkb.into_array_ref()))
}

/// Writes `table` as a GeoParquet file at `path`.
///
/// The file is first written to a temporary sibling and renamed into place, so
/// `path` either does not exist or holds a complete file. The parent directory
/// must exist.
///
/// # Errors
///
/// Returns an error if an attribute column is already named `geometry`, if a
/// geometry cannot be WKB-encoded, or on Parquet and filesystem failures.
pub fn write_geoparquet(table: &GeoTable, path: &Path) -> Result<()> {
    if table.attributes().column_by_name(GEOMETRY_COLUMN).is_some() {
        return Err(GeoTableError::DuplicateColumn {
            name: GEOMETRY_COLUMN.to_string(),
        });
    }

    let (geometry_field, geometry_array) = encode_geometry(table.geometry())?;
    let mut fields: Vec<Field> = table
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(geometry_field);
    let mut columns = table.attributes().columns().to_vec();
    columns.push(geometry_array);
    let schema = Arc::new(Schema::new(fields));
    let batch = batch_with_row_count(Arc::clone(&schema), columns, table.len())?;

    let metadata = build_metadata(table);
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue::new(
            GEO_METADATA_KEY.to_string(),
            serde_json::to_string(&metadata)?,
        )]))
        .build();

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| GeoTableError::io(dir, e))?;
    let mut writer = ArrowWriter::try_new(temp.as_file_mut(), schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    temp.persist(path)
        .map_err(|e| GeoTableError::io(path, e.error))?;

    debug!(
        "Wrote {} features to {} ({})",
        table.len(),
        path.display(),
        table.crs()
    );
    Ok(())
}

/// Reads the `geo` footer document of a Parquet file.
///
/// Returns `Ok(None)` for plain Parquet files.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, is not Parquet, or carries a
/// malformed `geo` document.
pub fn read_geoparquet_metadata(path: &Path) -> Result<Option<GeoParquetMetadata>> {
    let file = File::open(path).map_err(|e| GeoTableError::io(path, e))?;
    let reader = SerializedFileReader::new(file)?;
    let Some(entries) = reader.metadata().file_metadata().key_value_metadata() else {
        return Ok(None);
    };
    entries
        .iter()
        .find(|kv| kv.key == GEO_METADATA_KEY)
        .and_then(|kv| kv.value.as_deref())
        .map(serde_json::from_str)
        .transpose()
        .map_err(Into::into)
}

/// Loads a GeoParquet file written by [`write_geoparquet`] (or any GeoParquet
/// file with a WKB primary column) back into a [`GeoTable`].
///
/// # Errors
///
/// Returns an error if the file has no `geo` metadata, the primary column is
/// missing or not binary, or a geometry cannot be decoded.
pub fn read_geoparquet(path: &Path) -> Result<GeoTable> {
    let invalid = |message: String| GeoTableError::InvalidGeoParquet {
        path: path.to_path_buf(),
        message,
    };
    let metadata = read_geoparquet_metadata(path)?
        .ok_or_else(|| invalid("missing 'geo' metadata".to_string()))?;
    let column = metadata
        .columns
        .get(&metadata.primary_column)
        .ok_or_else(|| invalid(format!("no description for '{}'", metadata.primary_column)))?;

    let file = File::open(path).map_err(|e| GeoTableError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    let index = schema
        .index_of(&metadata.primary_column)
        .map_err(|_| invalid(format!("column '{}' not found", metadata.primary_column)))?;
    let wkb = batch.column(index);
    let geometry = match wkb.data_type() {
        DataType::Binary => decode_wkb(wkb.as_binary::<i32>())?,
        DataType::LargeBinary => decode_wkb(wkb.as_binary::<i64>())?,
        other => {
            return Err(GeoTableError::ColumnType {
                name: metadata.primary_column.clone(),
                expected: "Binary".to_string(),
                found: other.to_string(),
            });
        },
    };

    let keep: Vec<usize> = (0..batch.num_columns()).filter(|&i| i != index).collect();
    let attributes = batch.project(&keep)?;
    GeoTable::try_new(attributes, geometry, column.crs())
}

fn decode_wkb<O: arrow::array::OffsetSizeTrait>(
    array: &arrow::array::GenericBinaryArray<O>,
) -> Result<Vec<Option<Geometry<f64>>>> {
    array
        .iter()
        .map(|value| {
            value
                .map(|bytes| Wkb(bytes.to_vec()).to_geo())
                .transpose()
                .map_err(Into::into)
        })
        .collect()
}
