//! Dataset inspection for the `info` command.
//!
//! CSV downloads and GeoParquet outputs are both opened through a `DataFusion`
//! session; geometry details come from the Parquet footer's `geo` metadata.

use std::path::Path;

use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionContext};
use geotable::{GeoParquetMetadata, read_geoparquet_metadata};
use log::debug;

use crate::error::{DataFusionError, IoError, Result};
use crate::types::{DatasetInfo, FieldInfo, GeometryColumnInfo};
use crate::utils::ArrowDataTypeExt;

const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Reads the schema, row count and geometry columns of a local dataset.
///
/// `.csv` files are read as CSV with a header row; `.parquet` files are read
/// as Parquet, and reported as GeoParquet when they carry `geo` metadata.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] for a missing path,
/// [`IoError::UnsupportedFile`] for any other extension, and a `DataFusion`
/// or GeoParquet error when the file cannot be parsed.
pub async fn inspect_dataset(path: &Path) -> Result<DatasetInfo> {
    if !path.is_file() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let file_extension = format!(
        ".{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or_default()
    );
    let location = path.to_string_lossy().into_owned();

    let ctx = SessionContext::new();
    let (df, geo) = match extension.as_str() {
        "csv" => {
            debug!("Reading CSV file: {location}");
            let options = CsvReadOptions::new()
                .has_header(true)
                .file_extension(&file_extension);
            let df = ctx
                .read_csv(location.as_str(), options)
                .await
                .map_err(DataFusionError::from)?;
            (df, None)
        },
        "parquet" => {
            debug!("Reading Parquet file: {location}");
            let geo = read_geoparquet_metadata(path)?;
            let options = ParquetReadOptions {
                file_extension: &file_extension,
                ..Default::default()
            };
            let df = ctx
                .read_parquet(location.as_str(), options)
                .await
                .map_err(DataFusionError::from)?;
            (df, geo)
        },
        _ => {
            return Err(IoError::UnsupportedFile {
                path: path.to_path_buf(),
                reason: "expected a .csv or .parquet file".to_string(),
            }
            .into());
        },
    };

    let schema = df.schema().as_arrow().clone();
    let row_count = df.count().await.map_err(DataFusionError::from)?;

    let geometry_columns = geo
        .as_ref()
        .map(|meta| geometry_columns(meta, &schema))
        .unwrap_or_default();
    let fields = schema
        .fields()
        .iter()
        .filter(|f| !geometry_columns.iter().any(|g| &g.name == f.name()))
        .map(|f| FieldInfo {
            name: f.name().clone(),
            data_type: f.data_type().format(),
            nullable: f.is_nullable(),
        })
        .collect();

    let (driver, driver_long_name) = match (extension.as_str(), geo.is_some()) {
        ("csv", _) => ("CSV", "Comma Separated Value (.csv)"),
        (_, true) => ("GeoParquet", "GeoParquet (.parquet)"),
        (_, false) => ("Parquet", "Apache Parquet (.parquet)"),
    };

    Ok(DatasetInfo {
        dataset: location,
        driver: driver.to_string(),
        driver_long_name: driver_long_name.to_string(),
        row_count,
        geometry_columns,
        fields,
    })
}

fn geometry_columns(
    meta: &GeoParquetMetadata,
    schema: &datafusion::arrow::datatypes::Schema,
) -> Vec<GeometryColumnInfo> {
    meta.columns
        .iter()
        .map(|(name, column)| {
            let extension = schema
                .field_with_name(name)
                .ok()
                .and_then(|f| f.metadata().get(EXTENSION_NAME_KEY).cloned());
            GeometryColumnInfo {
                name: name.clone(),
                encoding: column.encoding.clone(),
                geometry_types: column.geometry_types.clone(),
                extension,
                crs: Some(column.crs().to_string()),
                bbox: column.bbox.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CivicEtlError;
    use std::io::Write;

    #[tokio::test]
    async fn inspects_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boston-311-2015.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "case_enquiry_id,case_title,latitude").unwrap();
        writeln!(file, "101001,Pothole,42.35").unwrap();
        writeln!(file, "101002,Graffiti,42.31").unwrap();
        drop(file);

        let info = inspect_dataset(&path).await.unwrap();
        assert_eq!(info.driver, "CSV");
        assert_eq!(info.row_count, 2);
        assert!(info.geometry_columns.is_empty());
        let names: Vec<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["case_enquiry_id", "case_title", "latitude"]);
        assert_eq!(info.fields[0].data_type, "Int64");
        assert_eq!(info.fields[2].data_type, "Float64");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect_dataset(&dir.path().join("none.parquet"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CivicEtlError::Io(IoError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tl_2024_us_state.shp");
        std::fs::write(&path, b"shape").unwrap();
        let err = inspect_dataset(&path).await.unwrap_err();
        assert!(matches!(
            err,
            CivicEtlError::Io(IoError::UnsupportedFile { .. })
        ));
    }
}
