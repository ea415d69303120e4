use std::path::Path;

use arrow::array::AsArray;
use arrow::array::Array;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use geotable::{
    Crs, GeoTableError, JOIN_INDEX_COLUMN, Predicate, read_geoparquet, read_geoparquet_metadata,
    read_shapefile, sjoin, write_geoparquet,
};
use shapefile::dbase::{Date, DateTime, FieldName, FieldValue, Record, TableWriterBuilder, Time};
use shapefile::{Point, Polygon, PolygonRing};

const NAD83_PRJ: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Clockwise square ring, as shapefiles expect for outer rings.
fn square(x0: f64, y0: f64, size: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y0 + size),
        Point::new(x0 + size, y0 + size),
        Point::new(x0 + size, y0),
        Point::new(x0, y0),
    ]))
}

fn write_layer(path: &Path, key: &str, rows: &[(&str, f64, Polygon)], prj: Option<&str>) {
    let builder = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from(key).unwrap(), 10)
        .add_numeric_field(FieldName::try_from("ALAND").unwrap(), 18, 0);
    {
        let mut writer = shapefile::Writer::from_path(path, builder).unwrap();
        for (code, area, shape) in rows {
            let mut record = Record::default();
            record.insert(key.to_string(), FieldValue::Character(Some((*code).to_string())));
            record.insert("ALAND".to_string(), FieldValue::Numeric(Some(*area)));
            writer.write_shape_and_record(shape, &record).unwrap();
        }
    }
    if let Some(prj) = prj {
        std::fs::write(path.with_extension("prj"), prj).unwrap();
    }
}

#[test]
fn reads_attributes_geometry_and_crs() {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join("tl_2024_us_state.shp");
    write_layer(
        &shp,
        "STUSPS",
        &[
            ("MA", 20_000.0, square(-73.5, 41.2, 3.0)),
            ("NH", 23_000.0, square(-72.5, 42.7, 1.5)),
        ],
        Some(NAD83_PRJ),
    );

    let table = read_shapefile(&shp).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.column_names(), vec!["STUSPS", "ALAND"]);
    assert_eq!(table.crs().epsg(), Some(4269));
    assert_eq!(table.column("STUSPS").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(table.column("ALAND").unwrap().data_type(), &DataType::Float64);
    let codes = table.column("STUSPS").unwrap().as_string::<i32>();
    assert_eq!(codes.value(1), "NH");
    assert!(table.geometry().iter().all(Option::is_some));
}

/// Rewrites the shape type of the last `.shp` record to 0 (null shape).
fn null_last_shape(shp: &Path, records: usize) {
    let shx = std::fs::read(shp.with_extension("shx")).unwrap();
    let entry = 100 + 8 * (records - 1);
    let words = i32::from_be_bytes(shx[entry..entry + 4].try_into().unwrap());
    let offset = usize::try_from(words).unwrap() * 2 + 8;
    let mut bytes = std::fs::read(shp).unwrap();
    bytes[offset..offset + 4].copy_from_slice(&0i32.to_le_bytes());
    std::fs::write(shp, bytes).unwrap();
}

#[test]
fn dbase_types_and_null_shapes_are_mapped() {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join("parcels.shp");
    let name = |n: &str| FieldName::try_from(n).unwrap();
    let builder = TableWriterBuilder::new()
        .add_character_field(name("NAME"), 10)
        .add_integer_field(name("UNITS"))
        .add_logical_field(name("VACANT"))
        .add_date_field(name("D"))
        .add_datetime_field(name("DT"))
        .add_double_field(name("AREA"))
        .add_float_field(name("RATIO"), 10, 2)
        .add_currency_field(name("VALUE"));
    {
        let mut writer = shapefile::Writer::from_path(&shp, builder).unwrap();
        let mut first = Record::default();
        first.insert("NAME".to_string(), FieldValue::Character(Some("Lot A".to_string())));
        first.insert("UNITS".to_string(), FieldValue::Integer(12));
        first.insert("VACANT".to_string(), FieldValue::Logical(Some(true)));
        first.insert("D".to_string(), FieldValue::Date(Some(Date::new(5, 3, 2024))));
        first.insert(
            "DT".to_string(),
            FieldValue::DateTime(DateTime::new(Date::new(5, 3, 2024), Time::new(14, 30, 0))),
        );
        first.insert("AREA".to_string(), FieldValue::Double(1250.5));
        first.insert("RATIO".to_string(), FieldValue::Float(Some(1.5)));
        first.insert("VALUE".to_string(), FieldValue::Currency(99.25));
        writer.write_shape_and_record(&square(0.0, 0.0, 1.0), &first).unwrap();

        let mut second = first.clone();
        second.insert("NAME".to_string(), FieldValue::Character(Some("Lot B".to_string())));
        second.insert("VACANT".to_string(), FieldValue::Logical(None));
        second.insert("D".to_string(), FieldValue::Date(None));
        writer.write_shape_and_record(&square(2.0, 0.0, 1.0), &second).unwrap();
    }
    null_last_shape(&shp, 2);

    let table = read_shapefile(&shp).unwrap();
    assert_eq!(table.len(), 2);
    let types: Vec<DataType> = table
        .column_names()
        .iter()
        .map(|c| table.column(c).unwrap().data_type().clone())
        .collect();
    assert_eq!(
        types,
        vec![
            DataType::Utf8,
            DataType::Int64,
            DataType::Boolean,
            DataType::Utf8,
            DataType::Utf8,
            DataType::Float64,
            DataType::Float64,
            DataType::Float64,
        ]
    );

    let units = table.column("UNITS").unwrap().as_primitive::<Int64Type>();
    assert_eq!(units.value(0), 12);
    let vacant = table.column("VACANT").unwrap().as_boolean();
    assert!(vacant.value(0));
    assert!(vacant.is_null(1));
    let dates = table.column("D").unwrap().as_string::<i32>();
    assert_eq!(dates.value(0), "2024-03-05");
    assert!(dates.is_null(1));
    let datetimes = table.column("DT").unwrap().as_string::<i32>();
    assert_eq!(datetimes.value(0), "2024-03-05T14:30:00");
    let area = table.column("AREA").unwrap().as_primitive::<Float64Type>();
    assert_eq!(area.value(0), 1250.5);
    let ratio = table.column("RATIO").unwrap().as_primitive::<Float64Type>();
    assert_eq!(ratio.value(0), 1.5);
    let value = table.column("VALUE").unwrap().as_primitive::<Float64Type>();
    assert_eq!(value.value(0), 99.25);

    assert!(table.geometry()[0].is_some());
    assert!(table.geometry()[1].is_none());
}

#[test]
fn missing_prj_gives_unknown_crs() {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join("layer.shp");
    write_layer(&shp, "ID", &[("a", 1.0, square(0.0, 0.0, 1.0))], None);

    let table = read_shapefile(&shp).unwrap();
    assert!(table.crs().is_unknown());
}

#[test]
fn missing_dbf_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join("layer.shp");
    write_layer(&shp, "ID", &[("a", 1.0, square(0.0, 0.0, 1.0))], None);
    std::fs::remove_file(shp.with_extension("dbf")).unwrap();

    let err = read_shapefile(&shp).unwrap_err();
    assert!(matches!(err, GeoTableError::MissingAttributeTable { .. }));
}

#[test]
fn state_filter_keeps_only_intersecting_zip_areas() {
    let dir = tempfile::tempdir().unwrap();
    let zcta = dir.path().join("tl_2024_us_zcta520.shp");
    let states = dir.path().join("tl_2024_us_state.shp");
    write_layer(
        &zcta,
        "ZCTA5CE20",
        &[
            ("02108", 300.0, square(-71.1, 42.3, 0.05)),
            ("03101", 400.0, square(-71.5, 43.0, 0.05)),
        ],
        Some(NAD83_PRJ),
    );
    write_layer(
        &states,
        "STUSPS",
        &[
            ("MA", 20_000.0, square(-72.0, 41.5, 1.0)),
            ("NH", 23_000.0, square(-72.5, 42.9, 1.5)),
        ],
        Some(NAD83_PRJ),
    );

    let zips = read_shapefile(&zcta).unwrap();
    let states = read_shapefile(&states).unwrap();
    let zips = zips.to_crs(states.crs()).unwrap();
    let ma = states.filter_eq("STUSPS", "MA").unwrap();
    assert_eq!(ma.len(), 1);

    let mut dropped: Vec<String> = ma
        .column_names()
        .into_iter()
        .filter(|c| !zips.column_names().contains(c))
        .collect();
    dropped.push(format!("ALAND{}", geotable::join::RIGHT_SUFFIX));
    dropped.push(JOIN_INDEX_COLUMN.to_string());

    let joined = sjoin(&zips, &ma, Predicate::Intersects)
        .unwrap()
        .drop_columns(dropped.as_slice())
        .unwrap();
    assert_eq!(joined.column_names(), vec!["ZCTA5CE20", "ALAND"]);

    let out = dir.path().join("massachusetts_zip_boundaries.parquet");
    write_geoparquet(&joined, &out).unwrap();

    let restored = read_geoparquet(&out).unwrap();
    assert_eq!(restored.len(), 1);
    let codes = restored.column("ZCTA5CE20").unwrap().as_string::<i32>();
    assert_eq!(codes.value(0), "02108");
    assert_eq!(restored.crs(), &Crs::from_epsg(4269));

    let meta = read_geoparquet_metadata(&out).unwrap().unwrap();
    assert_eq!(meta.columns["geometry"].geometry_types, vec!["MultiPolygon"]);
}
