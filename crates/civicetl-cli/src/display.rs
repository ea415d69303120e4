//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting run summaries, the source registry and dataset schemas.

use tabled::{Table, Tabled};

use civicetl_core::prepare::{PrepareOutcome, PrepareReport};
use civicetl_core::sources::{
    TABULAR_INFO_URL, single_resources, spatial_filter_jobs, tabular_sources,
};
use civicetl_core::tabular::{FetchReport, YearStatus};
use civicetl_core::types::DatasetInfo;
use civicetl_core::utils::{format_bbox, format_bytes};

/// Table row for one year of a `fetch-311` run.
#[derive(Tabled)]
pub struct FetchRow {
    #[tabled(rename = "Year")]
    pub year: u16,
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

/// Table row for one output of a `prepare-geo` run.
#[derive(Tabled)]
pub struct PrepareRow {
    #[tabled(rename = "Output")]
    pub name: String,
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

/// Table row for one year of tabular data.
#[derive(Tabled)]
pub struct TabularSourceRow {
    #[tabled(rename = "Year")]
    pub year: u16,
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "URL")]
    pub url: String,
}

/// Table row for one geospatial output.
#[derive(Tabled)]
pub struct ResourceRow {
    /// Output name, also the GeoParquet file stem.
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Publisher")]
    pub publisher: String,
    /// How the output is built.
    #[tabled(rename = "Processing")]
    pub processing: String,
    #[tabled(rename = "Info")]
    pub info_url: String,
}

/// Table row representation for displaying geometry column information.
#[derive(Tabled)]
pub struct GeometryRow {
    /// Name of the geometry column.
    #[tabled(rename = "Column")]
    pub name: String,
    /// Physical encoding of the geometries.
    #[tabled(rename = "Encoding")]
    pub encoding: String,
    /// Geometry types present in the column.
    #[tabled(rename = "Types")]
    pub geometry_types: String,
    /// Coordinate Reference System information.
    #[tabled(rename = "CRS")]
    pub crs: String,
    /// Bounding box of all geometries.
    #[tabled(rename = "Extent")]
    pub bbox: String,
}

/// Table row representation for displaying field/column information.
#[derive(Tabled)]
pub struct FieldRow {
    /// Name of the field.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Data type of the field.
    #[tabled(rename = "Type")]
    pub data_type: String,
    /// Whether the field can contain null values.
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

fn fetch_rows(report: &FetchReport) -> Vec<FetchRow> {
    report
        .outcomes
        .iter()
        .map(|o| FetchRow {
            year: o.year,
            file: o.path.display().to_string(),
            status: match &o.status {
                YearStatus::Present => "present".to_string(),
                YearStatus::Downloaded { bytes } => {
                    format!("downloaded ({})", format_bytes(*bytes))
                },
                YearStatus::Failed { error } => format!("FAILED: {error}"),
            },
        })
        .collect()
}

fn prepare_rows(report: &PrepareReport) -> Vec<PrepareRow> {
    report
        .outcomes
        .iter()
        .map(|o| PrepareRow {
            name: o.name.to_string(),
            file: o.path.display().to_string(),
            status: match &o.result {
                Ok(PrepareOutcome::AlreadyPresent) => "present".to_string(),
                Ok(PrepareOutcome::Written { rows }) => format!("written ({rows} features)"),
                Err(error) => format!("FAILED: {error}"),
            },
        })
        .collect()
}

fn resource_rows() -> Vec<ResourceRow> {
    let filters = spatial_filter_jobs().iter().map(|job| ResourceRow {
        name: job.output.to_string(),
        publisher: job.layer.publisher.to_string(),
        processing: format!(
            "{} intersecting {} where {} = '{}'",
            job.layer.name, job.boundary.name, job.boundary_column, job.boundary_code
        ),
        info_url: job.layer.info_url.to_string(),
    });
    let singles = single_resources().iter().map(|r| ResourceRow {
        name: r.name.to_string(),
        publisher: r.publisher.to_string(),
        processing: "converted as-is".to_string(),
        info_url: r.info_url.to_string(),
    });
    filters.chain(singles).collect()
}

/// Prints the per-year summary of a `fetch-311` run.
pub fn display_fetch_report(report: &FetchReport) {
    println!("\n=== 311 Service Requests ===");
    println!("{}", Table::new(fetch_rows(report)));
}

/// Prints the per-output summary of a `prepare-geo` run.
pub fn display_prepare_report(report: &PrepareReport) {
    println!("\n=== Geospatial Outputs ===");
    println!("{}", Table::new(prepare_rows(report)));
}

/// Prints the source registry.
pub fn display_sources() {
    let tabular: Vec<TabularSourceRow> = tabular_sources()
        .iter()
        .map(|s| TabularSourceRow {
            year: s.year,
            file: s.file_name(),
            url: s.url.to_string(),
        })
        .collect();

    println!("\n=== 311 Service Requests ({TABULAR_INFO_URL}) ===");
    println!("{}", Table::new(tabular));

    println!("\n=== Geospatial Outputs ===");
    println!("{}", Table::new(resource_rows()));
}

/// Display dataset information in a formatted table.
///
/// This function presents dataset metadata, geometry columns, and field schema
/// in a human-readable table format written to standard output.
pub fn display_dataset_info(info: &DatasetInfo) {
    println!("\nDataset: {}", info.dataset);
    println!("Driver: {} ({})", info.driver, info.driver_long_name);
    println!("Rows: {}", info.row_count);

    if !info.geometry_columns.is_empty() {
        println!("\n=== Geometry Columns ===");

        let geo_rows: Vec<GeometryRow> = info
            .geometry_columns
            .iter()
            .map(|g| GeometryRow {
                name: g.name.clone(),
                encoding: g.extension.as_ref().map_or_else(
                    || g.encoding.clone(),
                    |ext| format!("{} ({ext})", g.encoding),
                ),
                geometry_types: g.geometry_types.join(", "),
                crs: g.crs.clone().unwrap_or_else(|| "N/A".to_string()),
                bbox: g
                    .bbox
                    .as_deref()
                    .map_or_else(|| "N/A".to_string(), format_bbox),
            })
            .collect();

        let geo_table = Table::new(geo_rows).to_string();
        println!("{geo_table}");
    }

    if !info.fields.is_empty() {
        println!("\n=== Fields ===");

        let field_rows: Vec<FieldRow> = info
            .fields
            .iter()
            .map(|f| FieldRow {
                name: f.name.clone(),
                data_type: f.data_type.clone(),
                nullable: if f.nullable { "Yes" } else { "No" }.to_string(),
            })
            .collect();

        let field_table = Table::new(field_rows).to_string();
        println!("{field_table}");
    }
}
