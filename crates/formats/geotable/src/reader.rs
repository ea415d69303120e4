//! ESRI shapefile reader.
//!
//! A shapefile is a set of sibling files sharing a stem: `.shp` (geometry),
//! `.dbf` (attributes) and an optional `.prj` (CRS as WKT). Sidecars are found
//! with either lower- or upper-case extensions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayBuilder, ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_schema::{DataType, Field, Schema};
use geo_types::Geometry;
use log::{debug, warn};
use shapefile::dbase::{self, FieldType, FieldValue};
use shapefile::{Shape, ShapeReader};

use crate::crs::Crs;
use crate::error::{GeoTableError, Result};
use crate::table::{GeoTable, batch_with_row_count};

/// dBase keeps a hidden deletion marker in the field list.
const DELETION_FLAG: &str = "DeletionFlag";

/// Reads a shapefile and its sidecars into a [`GeoTable`].
///
/// Attribute columns keep the `.dbf` field order. Character, memo and date
/// fields become `Utf8` (dates as `YYYY-MM-DD`, date-times as
/// `YYYY-MM-DDTHH:MM:SS`), numeric fields `Float64`, integers `Int64` and
/// logicals `Boolean`. Null shapes become null geometries. A missing `.prj`
/// yields an unknown CRS.
///
/// # Errors
///
/// Returns an error if the `.shp` or `.dbf` cannot be read, if the `.dbf` is
/// missing, if the two disagree on the number of records, or if a shape cannot
/// be converted into a geometry.
pub fn read_shapefile(path: &Path) -> Result<GeoTable> {
    let shapes = ShapeReader::from_path(path)
        .and_then(ShapeReader::read)
        .map_err(|source| GeoTableError::Shapefile {
            path: path.to_path_buf(),
            source,
        })?;

    let geometry = shapes
        .into_iter()
        .enumerate()
        .map(|(index, shape)| shape_to_geometry(index, shape))
        .collect::<Result<Vec<_>>>()?;

    let dbf = sidecar(path, "dbf").ok_or_else(|| GeoTableError::MissingAttributeTable {
        path: path.to_path_buf(),
    })?;
    let attributes = read_attributes(&dbf, geometry.len())?;

    let crs = match sidecar(path, "prj") {
        Some(prj) => {
            let bytes = std::fs::read(&prj).map_err(|e| GeoTableError::io(&prj, e))?;
            Crs::from_wkt(&String::from_utf8_lossy(&bytes))
        },
        None => {
            warn!("No .prj next to {}, CRS is unknown", path.display());
            Crs::unknown()
        },
    };

    debug!(
        "Read {} features with {} attribute columns from {} ({crs})",
        geometry.len(),
        attributes.num_columns(),
        path.display()
    );

    GeoTable::try_new(attributes, geometry, crs)
}

fn shape_to_geometry(index: usize, shape: Shape) -> Result<Option<Geometry<f64>>> {
    if matches!(shape, Shape::NullShape) {
        return Ok(None);
    }
    Geometry::<f64>::try_from(shape)
        .map(Some)
        .map_err(|e| GeoTableError::InvalidGeometry {
            index,
            message: format!("{e:?}"),
        })
}

/// Finds `<stem>.<ext>` next to `path`, trying lower then upper case.
fn sidecar(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

enum ColumnBuilder {
    Utf8(StringBuilder),
    Float64(Float64Builder),
    Int64(Int64Builder),
    Boolean(BooleanBuilder),
}

impl ColumnBuilder {
    fn for_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Numeric | FieldType::Float | FieldType::Double | FieldType::Currency => {
                Self::Float64(Float64Builder::new())
            },
            FieldType::Integer => Self::Int64(Int64Builder::new()),
            FieldType::Logical => Self::Boolean(BooleanBuilder::new()),
            _ => Self::Utf8(StringBuilder::new()),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Utf8(_) => DataType::Utf8,
            Self::Float64(_) => DataType::Float64,
            Self::Int64(_) => DataType::Int64,
            Self::Boolean(_) => DataType::Boolean,
        }
    }

    fn append(&mut self, value: Option<&FieldValue>) {
        match self {
            Self::Utf8(b) => b.append_option(value.and_then(text_value)),
            Self::Float64(b) => b.append_option(value.and_then(float_value)),
            Self::Int64(b) => b.append_option(match value {
                Some(FieldValue::Integer(v)) => Some(i64::from(*v)),
                Some(FieldValue::Numeric(v)) => v.map(|v| v as i64),
                _ => None,
            }),
            Self::Boolean(b) => b.append_option(match value {
                Some(FieldValue::Logical(v)) => *v,
                _ => None,
            }),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Utf8(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Boolean(b) => Arc::new(b.finish()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Utf8(b) => b.len(),
            Self::Float64(b) => b.len(),
            Self::Int64(b) => b.len(),
            Self::Boolean(b) => b.len(),
        }
    }
}

fn text_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(v) => v.as_ref().map(|s| s.trim_end().to_string()),
        FieldValue::Memo(s) => Some(s.clone()),
        FieldValue::Date(d) => d.as_ref().map(format_date),
        FieldValue::DateTime(dt) => Some(format_datetime(dt)),
        FieldValue::Numeric(v) => v.map(|v| v.to_string()),
        FieldValue::Integer(v) => Some(v.to_string()),
        FieldValue::Logical(v) => v.map(|v| v.to_string()),
        _ => None,
    }
}

fn float_value(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Numeric(v) => *v,
        FieldValue::Float(v) => v.map(f64::from),
        FieldValue::Double(v) | FieldValue::Currency(v) => Some(*v),
        FieldValue::Integer(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn format_date(date: &dbase::Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn format_datetime(datetime: &dbase::DateTime) -> String {
    let time = datetime.time();
    format!(
        "{}T{:02}:{:02}:{:02}",
        format_date(&datetime.date()),
        time.hours(),
        time.minutes(),
        time.seconds()
    )
}

fn read_attributes(dbf: &Path, expected_rows: usize) -> Result<arrow::array::RecordBatch> {
    let dbase_error = |source| GeoTableError::Dbase {
        path: dbf.to_path_buf(),
        source,
    };
    let mut reader = dbase::Reader::from_path(dbf).map_err(dbase_error)?;

    let mut names = Vec::new();
    let mut builders = Vec::new();
    for info in reader.fields() {
        if info.name() == DELETION_FLAG {
            continue;
        }
        names.push(info.name().to_string());
        builders.push(ColumnBuilder::for_field(info.field_type()));
    }

    let records = reader.read().map_err(dbase_error)?;
    if records.len() != expected_rows {
        return Err(GeoTableError::RecordCountMismatch {
            path: dbf.with_extension("shp"),
            shapes: expected_rows,
            records: records.len(),
        });
    }

    for record in &records {
        for (name, builder) in names.iter().zip(builders.iter_mut()) {
            builder.append(record.get(name));
        }
    }

    let fields: Vec<Field> = names
        .iter()
        .zip(&builders)
        .map(|(name, b)| Field::new(name, b.data_type(), true))
        .collect();
    debug_assert!(builders.iter().all(|b| b.len() == expected_rows));
    let columns = builders.iter_mut().map(ColumnBuilder::finish).collect();
    batch_with_row_count(Arc::new(Schema::new(fields)), columns, expected_rows)
}
