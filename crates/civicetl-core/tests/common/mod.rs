//! Shared fixtures: an in-memory downloader and zipped shapefile builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use civicetl_core::download::Downloader;
use civicetl_core::error::{FetchError, Result};
use civicetl_core::layout::DataLayout;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use zip::write::SimpleFileOptions;

pub const NAD83_PRJ: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Serves canned bodies by URL and records every request.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Default)]
pub struct FakeDownloader {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.requests.lock().unwrap().push(url.to_string());
        let Some(body) = self.responses.get(url) else {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }
            .into());
        };
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, body).unwrap();
        Ok(body.len() as u64)
    }
}

/// Layout with both directories inside `root`.
pub fn layout(root: &Path) -> DataLayout {
    DataLayout::new(root.join("raw"), root.join("processed"))
}

/// Clockwise square ring, as shapefiles expect for outer rings.
pub fn square(x0: f64, y0: f64, size: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y0 + size),
        Point::new(x0 + size, y0 + size),
        Point::new(x0 + size, y0),
        Point::new(x0, y0),
    ]))
}

/// Zip of a polygon shapefile with a character `key` column and a numeric
/// `ALAND` column, plus a NAD83 `.prj`.
pub fn shapefile_zip(stem: &str, key: &str, rows: &[(&str, f64, Polygon)]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join(format!("{stem}.shp"));
    let builder = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from(key).unwrap(), 10)
        .add_numeric_field(FieldName::try_from("ALAND").unwrap(), 18, 0);
    {
        let mut writer = shapefile::Writer::from_path(&shp, builder).unwrap();
        for (code, area, shape) in rows {
            let mut record = Record::default();
            record.insert(key.to_string(), FieldValue::Character(Some((*code).to_string())));
            record.insert("ALAND".to_string(), FieldValue::Numeric(Some(*area)));
            writer.write_shape_and_record(shape, &record).unwrap();
        }
    }
    std::fs::write(shp.with_extension("prj"), NAD83_PRJ).unwrap();

    let mut entries = Vec::new();
    for ext in ["shp", "shx", "dbf", "prj"] {
        let name = format!("{stem}.{ext}");
        let body = std::fs::read(dir.path().join(&name)).unwrap();
        entries.push((name, body));
    }
    zip_bytes(&entries)
}

/// In-memory zip archive of `(name, body)` entries.
pub fn zip_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
