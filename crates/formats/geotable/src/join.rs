//! Spatial join between two geometry tables.

use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use geo::{BoundingRect, Intersects, Relate};
use geo_types::{Geometry, Rect};
use log::{debug, warn};

use crate::error::Result;
use crate::table::{GeoTable, batch_with_row_count, take_batch};

/// Column added by [`sjoin`] holding the matched row index of the right table.
pub const JOIN_INDEX_COLUMN: &str = "index_right";

/// Suffix appended to right-hand columns whose name already exists on the left.
pub const RIGHT_SUFFIX: &str = "_right";

/// Binary spatial predicate evaluated as `left <predicate> right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// The geometries share at least one point.
    Intersects,
    /// The left geometry contains the right one.
    Contains,
    /// The left geometry lies within the right one.
    Within,
}

impl Predicate {
    fn evaluate(self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        match self {
            Self::Intersects => left.intersects(right),
            Self::Contains => left.relate(right).is_contains(),
            Self::Within => left.relate(right).is_within(),
        }
    }
}

/// Inner spatial join.
///
/// Emits one row per `(left, right)` pair satisfying `predicate`, ordered by
/// left row then right row. The output keeps the left geometry and CRS; its
/// attributes are the left columns, then the right columns (suffixed with
/// [`RIGHT_SUFFIX`] on collision), then [`JOIN_INDEX_COLUMN`]. Rows with a null
/// geometry on either side never match.
///
/// # Errors
///
/// Propagates Arrow errors from assembling the joined batch.
pub fn sjoin(left: &GeoTable, right: &GeoTable, predicate: Predicate) -> Result<GeoTable> {
    if !left.crs().is_equivalent(right.crs()) {
        warn!(
            "Spatial join between different CRS: left is {}, right is {}",
            left.crs(),
            right.crs()
        );
    }

    let right_bounds: Vec<Option<Rect<f64>>> = right
        .geometry()
        .iter()
        .map(|g| g.as_ref().and_then(|g| g.bounding_rect()))
        .collect();

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (i, left_geom) in (0u32..).zip(left.geometry()) {
        let Some(left_geom) = left_geom else { continue };
        let Some(left_rect) = left_geom.bounding_rect() else {
            continue;
        };
        for ((j, right_geom), right_rect) in (0u32..).zip(right.geometry()).zip(&right_bounds) {
            let (Some(right_geom), Some(right_rect)) = (right_geom, right_rect) else {
                continue;
            };
            if !rects_overlap(&left_rect, right_rect) {
                continue;
            }
            if predicate.evaluate(left_geom, right_geom) {
                left_rows.push(i);
                right_rows.push(j);
            }
        }
    }
    debug!(
        "{predicate:?} join matched {} pairs ({} left rows, {} right rows)",
        left_rows.len(),
        left.len(),
        right.len()
    );

    let left_part = take_batch(left.attributes(), &left_rows)?;
    let right_part = take_batch(right.attributes(), &right_rows)?;

    let mut fields: Vec<Field> = left_part
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut columns: Vec<ArrayRef> = left_part.columns().to_vec();

    let left_names = left.column_names();
    for (field, column) in right_part.schema().fields().iter().zip(right_part.columns()) {
        let name = if left_names.contains(field.name()) {
            format!("{}{RIGHT_SUFFIX}", field.name())
        } else {
            field.name().clone()
        };
        fields.push(field.as_ref().clone().with_name(name));
        columns.push(Arc::clone(column));
    }

    fields.push(Field::new(JOIN_INDEX_COLUMN, DataType::UInt64, false));
    columns.push(Arc::new(UInt64Array::from_iter_values(
        right_rows.iter().map(|&j| u64::from(j)),
    )));

    let attributes = batch_with_row_count(Arc::new(Schema::new(fields)), columns, left_rows.len())?;
    let geometry = left_rows
        .iter()
        .map(|&i| left.geometry()[i as usize].clone())
        .collect();
    GeoTable::try_new(attributes, geometry, left.crs().clone())
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use arrow::array::{AsArray, RecordBatch, StringArray};
    use arrow::datatypes::UInt64Type;
    use geo_types::{Point, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ])
    }

    fn table(names: Vec<(&str, Vec<&str>)>, geometry: Vec<Option<Geometry<f64>>>) -> GeoTable {
        let fields: Vec<Field> = names
            .iter()
            .map(|(n, _)| Field::new(*n, DataType::Utf8, true))
            .collect();
        let columns: Vec<ArrayRef> = names
            .iter()
            .map(|(_, v)| Arc::new(StringArray::from(v.clone())) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();
        GeoTable::try_new(batch, geometry, Crs::from_epsg(4269)).unwrap()
    }

    #[test]
    fn intersects_keeps_overlapping_pairs_in_left_order() {
        let zips = table(
            vec![("ZCTA5CE20", vec!["02101", "03101", "02199"]), ("NAME", vec!["a", "b", "c"])],
            vec![
                Some(square(1.0, 1.0, 1.0)),
                Some(square(20.0, 20.0, 1.0)),
                Some(square(9.5, 9.5, 1.0)),
            ],
        );
        let states = table(
            vec![("STUSPS", vec!["MA"]), ("NAME", vec!["Massachusetts"])],
            vec![Some(square(0.0, 0.0, 10.0))],
        );

        let joined = sjoin(&zips, &states, Predicate::Intersects).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(
            joined.column_names(),
            vec!["ZCTA5CE20", "NAME", "STUSPS", "NAME_right", "index_right"]
        );
        let codes = joined.column("ZCTA5CE20").unwrap().as_string::<i32>();
        assert_eq!(codes.value(0), "02101");
        assert_eq!(codes.value(1), "02199");
        let index = joined
            .column(JOIN_INDEX_COLUMN)
            .unwrap()
            .as_primitive::<UInt64Type>();
        assert_eq!(index.values().to_vec(), vec![0, 0]);
        assert_eq!(joined.geometry()[1], Some(square(9.5, 9.5, 1.0)));
    }

    #[test]
    fn one_row_per_matching_pair() {
        let points = table(
            vec![("id", vec!["p"])],
            vec![Some(Geometry::Point(Point::new(5.0, 5.0)))],
        );
        let areas = table(
            vec![("area", vec!["x", "y", "z"])],
            vec![
                Some(square(0.0, 0.0, 10.0)),
                Some(square(50.0, 50.0, 1.0)),
                Some(square(4.0, 4.0, 2.0)),
            ],
        );
        let joined = sjoin(&points, &areas, Predicate::Within).unwrap();
        let index = joined
            .column(JOIN_INDEX_COLUMN)
            .unwrap()
            .as_primitive::<UInt64Type>();
        assert_eq!(index.values().to_vec(), vec![0, 2]);
    }

    #[test]
    fn contains_is_directional() {
        let big = table(vec![("id", vec!["big"])], vec![Some(square(0.0, 0.0, 10.0))]);
        let small = table(vec![("id", vec!["small"])], vec![Some(square(2.0, 2.0, 1.0))]);
        assert_eq!(sjoin(&big, &small, Predicate::Contains).unwrap().len(), 1);
        assert_eq!(sjoin(&small, &big, Predicate::Contains).unwrap().len(), 0);
    }

    #[test]
    fn null_geometries_never_match() {
        let left = table(vec![("id", vec!["a", "b"])], vec![None, Some(square(0.0, 0.0, 1.0))]);
        let right = table(vec![("k", vec!["x"])], vec![None]);
        let joined = sjoin(&left, &right, Predicate::Intersects).unwrap();
        assert!(joined.is_empty());
        assert_eq!(joined.column_names(), vec!["id", "k", "index_right"]);
    }
}
