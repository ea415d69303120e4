//! In-memory geometry collection.

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch, RecordBatchOptions, UInt32Array};
use arrow::compute::take;
use arrow_schema::{ArrowError, DataType, SchemaRef};
use geo_types::Geometry;

use crate::crs::{Crs, Transformer};
use crate::error::{GeoTableError, Result};

/// A table of features: Arrow attributes plus one geometry per row and a CRS.
///
/// The attribute batch never contains the geometry; it is kept as
/// `geo_types` values so predicates and reprojection can work on it directly.
/// A row's geometry may be `None` (null shapes in the source).
#[derive(Debug, Clone)]
pub struct GeoTable {
    attributes: RecordBatch,
    geometry: Vec<Option<Geometry<f64>>>,
    crs: Crs,
}

impl GeoTable {
    /// Builds a table from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute row count differs from the number of
    /// geometries.
    pub fn try_new(
        attributes: RecordBatch,
        geometry: Vec<Option<Geometry<f64>>>,
        crs: Crs,
    ) -> Result<Self> {
        if attributes.num_rows() != geometry.len() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "attribute table has {} rows but {} geometries were supplied",
                attributes.num_rows(),
                geometry.len()
            ))
            .into());
        }
        Ok(Self {
            attributes,
            geometry,
            crs,
        })
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    /// Returns `true` when the table holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Attribute columns (without geometry).
    #[must_use]
    pub fn attributes(&self) -> &RecordBatch {
        &self.attributes
    }

    /// Schema of the attribute columns.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.attributes.schema()
    }

    /// Geometry of every row.
    #[must_use]
    pub fn geometry(&self) -> &[Option<Geometry<f64>>] {
        &self.geometry
    }

    /// Coordinate reference system of the geometry column.
    #[must_use]
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Replaces the CRS label without touching coordinates.
    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Attribute column names in schema order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.attributes
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Looks up an attribute column by name.
    ///
    /// # Errors
    ///
    /// Returns [`GeoTableError::ColumnNotFound`] listing the available columns.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.attributes
            .column_by_name(name)
            .ok_or_else(|| GeoTableError::ColumnNotFound {
                name: name.to_string(),
                available: self.column_names().join(", "),
            })
    }

    /// Selects rows by index, in the given order.
    ///
    /// # Errors
    ///
    /// Propagates Arrow `take` errors (e.g. out-of-range indices).
    pub fn take(&self, indices: &[u32]) -> Result<Self> {
        let attributes = take_batch(&self.attributes, indices)?;
        let geometry = indices
            .iter()
            .map(|&i| self.geometry[i as usize].clone())
            .collect();
        Self::try_new(attributes, geometry, self.crs.clone())
    }

    /// Keeps the rows whose string column equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or not a string column.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Self> {
        let array = self.column(column)?;
        let indices: Vec<u32> = match array.data_type() {
            DataType::Utf8 => matching_rows(array.as_string::<i32>().iter(), value),
            DataType::LargeUtf8 => matching_rows(array.as_string::<i64>().iter(), value),
            other => {
                return Err(GeoTableError::ColumnType {
                    name: column.to_string(),
                    expected: "Utf8".to_string(),
                    found: other.to_string(),
                });
            },
        };
        self.take(&indices)
    }

    /// Removes the named attribute columns; unknown names are ignored.
    ///
    /// # Errors
    ///
    /// Propagates Arrow projection errors.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let schema = self.attributes.schema();
        let keep: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !names.iter().any(|n| n.as_ref() == f.name()))
            .map(|(i, _)| i)
            .collect();
        let attributes = self.attributes.project(&keep)?;
        Self::try_new(attributes, self.geometry.clone(), self.crs.clone())
    }

    /// Reprojects every geometry into `target`.
    ///
    /// Equivalent systems only relabel the table.
    ///
    /// # Errors
    ///
    /// Returns [`GeoTableError::UnsupportedReprojection`] when no transformation
    /// is known, or a projection error for coordinates outside the domain.
    pub fn to_crs(&self, target: &Crs) -> Result<Self> {
        let Some(transformer) = Transformer::new(&self.crs, target)? else {
            return Ok(self.clone().with_crs(target.clone()));
        };
        let geometry = self
            .geometry
            .iter()
            .map(|g| g.as_ref().map(|g| transformer.transform_geometry(g)).transpose())
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(self.attributes.clone(), geometry, target.clone())
    }
}

fn matching_rows<'a>(values: impl Iterator<Item = Option<&'a str>>, value: &str) -> Vec<u32> {
    values
        .enumerate()
        .filter(|(_, v)| *v == Some(value))
        .filter_map(|(i, _)| u32::try_from(i).ok())
        .collect()
}

/// `take` over every column, keeping the row count for column-less batches.
pub(crate) fn take_batch(batch: &RecordBatch, indices: &[u32]) -> Result<RecordBatch> {
    let indices = UInt32Array::from(indices.to_vec());
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    batch_with_row_count(batch.schema(), columns, indices.len())
}

pub(crate) fn batch_with_row_count(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    rows: usize,
) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}
