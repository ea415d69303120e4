//! Static registry of the datasets `civicetl` knows how to fetch.
//!
//! Two kinds of sources exist:
//! - **Tabular sources**: one CSV per year of Boston 311 service requests.
//! - **Geospatial resources**: zipped shapefiles, either converted as-is
//!   ([`single_resources`]) or combined by a spatial filter
//!   ([`spatial_filter_jobs`]).
//!
//! # Examples
//!
//! ```
//! use civicetl_core::sources::{find_resource, tabular_sources};
//!
//! let years: Vec<u16> = tabular_sources().iter().map(|s| s.year).collect();
//! assert_eq!(years.first(), Some(&2015));
//!
//! assert!(find_resource("boston_neighborhood_boundaries").is_ok());
//! ```

use crate::error::{Result, source_not_found};

/// Dataset label used in tabular file names.
pub const TABULAR_DATASET: &str = "boston-311";

/// Human-readable page describing the 311 dataset.
pub const TABULAR_INFO_URL: &str = "https://data.boston.gov/dataset/311-service-requests";

const TIGER_INFO_URL: &str =
    "https://www.census.gov/geographies/mapping-files/time-series/geo/tiger-line-file.html";

/// One year of tabular data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabularSource {
    /// Dataset label, used as the file name prefix
    pub dataset: &'static str,
    /// Calendar year covered by the file
    pub year: u16,
    /// Direct CSV download URL
    pub url: &'static str,
}

impl TabularSource {
    /// Local file name, `<dataset>-<year>.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-{}.csv", self.dataset, self.year)
    }
}

/// A downloadable zipped shapefile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    /// Stable identifier; names the archive, scratch directory and output file
    pub name: &'static str,
    /// Label used in log lines
    pub display_name: &'static str,
    /// Who publishes the data (e.g., "Analyze Boston")
    pub publisher: &'static str,
    /// Human-readable page describing the dataset
    pub info_url: &'static str,
    /// Direct archive download URL
    pub url: &'static str,
}

/// Keeps the features of one layer that intersect a selected boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialFilterJob {
    /// Name of the processed output
    pub output: &'static str,
    /// Fine-grained layer whose features are kept
    pub layer: Resource,
    /// Layer holding the boundary polygons
    pub boundary: Resource,
    /// Attribute of `boundary` used to select the boundary feature
    pub boundary_column: &'static str,
    /// Value of `boundary_column` to select
    pub boundary_code: &'static str,
}

const BOSTON_311_URLS: [(u16, &str); 10] = [
    (
        2015,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/c9509ab4-6f6d-4b97-979a-0cf2a10c922b/download/tmphrybkxuh.csv",
    ),
    (
        2016,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/b7ea6b1b-3ca4-4c5b-9713-6dc1db52379a/download/tmpzxzxeqfb.csv",
    ),
    (
        2017,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/30022137-709d-465e-baae-ca155b51927d/download/tmpzccn8u4q.csv",
    ),
    (
        2018,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/2be28d90-3a90-4af1-a3f6-f28c1e25880a/download/tmp7602cia8.csv",
    ),
    (
        2019,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/ea2e4696-4a2d-429c-9807-d02eb92e0222/download/tmpcje3ep_w.csv",
    ),
    (
        2020,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/6ff6a6fd-3141-4440-a880-6f60a37fe789/download/tmpcv_10m2s.csv",
    ),
    (
        2021,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/f53ebccd-bc61-49f9-83db-625f209c95f5/download/tmp88p9g82n.csv",
    ),
    (
        2022,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/81a7b022-f8fc-4da5-80e4-b160058ca207/download/tmpfm8veglw.csv",
    ),
    (
        2023,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/e6013a93-1321-4f2a-bf91-8d8a02f1e62f/download/tmpwbgyud93.csv",
    ),
    (
        2024,
        "https://data.boston.gov/dataset/8048697b-ad64-4bfc-b090-ee00169f2323/resource/dff4d804-5031-443a-8409-8344efd0e5c8/download/tmpm461rr5o.csv",
    ),
];

const ZCTA_2024: Resource = Resource {
    name: "tl_2024_us_zcta520",
    display_name: "ZIP Code Tabulation Areas",
    publisher: "US Census Bureau",
    info_url: TIGER_INFO_URL,
    url: "https://www2.census.gov/geo/tiger/TIGER2024/ZCTA520/tl_2024_us_zcta520.zip",
};

const STATES_2024: Resource = Resource {
    name: "tl_2024_us_state",
    display_name: "State Boundaries",
    publisher: "US Census Bureau",
    info_url: TIGER_INFO_URL,
    url: "https://www2.census.gov/geo/tiger/TIGER2024/STATE/tl_2024_us_state.zip",
};

const SPATIAL_FILTER_JOBS: [SpatialFilterJob; 1] = [SpatialFilterJob {
    output: "massachusetts_zip_boundaries",
    layer: ZCTA_2024,
    boundary: STATES_2024,
    boundary_column: "STUSPS",
    boundary_code: "MA",
}];

const SINGLE_RESOURCES: [Resource; 2] = [
    Resource {
        name: "boston_neighborhood_boundaries",
        display_name: "Boston Neighborhood Boundaries",
        publisher: "Analyze Boston",
        info_url: "https://data.boston.gov/dataset/bpda-neighborhood-boundaries",
        url: "https://data.boston.gov/dataset/bf1a7b50-4c72-4637-b0fa-11d632e3aff1/resource/f6be6d34-7813-4b55-955d-4b2c236243d6/download/boston_neighborhood_boundaries.zip",
    },
    Resource {
        name: "live_street_address_management_sam_addresses",
        display_name: "Live Street Address Management (SAM) Addresses",
        publisher: "Analyze Boston",
        info_url: "https://data.boston.gov/dataset/live-street-address-management-sam-addresses",
        url: "https://data.boston.gov/dataset/fc9562ca-02df-40bf-b4db-a36effb52ccc/resource/b7f6856f-0e69-40e5-8c27-0a40c132802a/download/live_street_address_management_sam_addresses.zip",
    },
];

/// Every year of 311 data, in ascending year order.
#[must_use]
pub fn tabular_sources() -> Vec<TabularSource> {
    let mut sources: Vec<TabularSource> = BOSTON_311_URLS
        .iter()
        .map(|&(year, url)| TabularSource {
            dataset: TABULAR_DATASET,
            year,
            url,
        })
        .collect();
    sources.sort_by_key(|s| s.year);
    sources
}

/// Multi-source jobs, run before the single resources.
#[must_use]
pub fn spatial_filter_jobs() -> &'static [SpatialFilterJob] {
    &SPATIAL_FILTER_JOBS
}

/// Archives converted to GeoParquet without further processing.
#[must_use]
pub fn single_resources() -> &'static [Resource] {
    &SINGLE_RESOURCES
}

/// Names of every processed geospatial output, in processing order.
#[must_use]
pub fn resource_names() -> Vec<&'static str> {
    spatial_filter_jobs()
        .iter()
        .map(|j| j.output)
        .chain(single_resources().iter().map(|r| r.name))
        .collect()
}

/// A geospatial output selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoTask {
    /// Filter a layer by a boundary
    SpatialFilter(SpatialFilterJob),
    /// Convert a single archive
    Single(Resource),
}

impl GeoTask {
    /// Name of the processed output.
    #[must_use]
    pub fn output_name(&self) -> &'static str {
        match self {
            Self::SpatialFilter(job) => job.output,
            Self::Single(resource) => resource.name,
        }
    }
}

/// Every geospatial task in processing order.
#[must_use]
pub fn geo_tasks() -> Vec<GeoTask> {
    spatial_filter_jobs()
        .iter()
        .copied()
        .map(GeoTask::SpatialFilter)
        .chain(single_resources().iter().copied().map(GeoTask::Single))
        .collect()
}

/// Finds a geospatial task by output name (case-insensitive).
///
/// # Errors
///
/// Returns [`SourceError::NotFound`](crate::error::SourceError::NotFound)
/// listing the registered names.
pub fn find_resource(name: &str) -> Result<GeoTask> {
    geo_tasks()
        .into_iter()
        .find(|t| t.output_name().eq_ignore_ascii_case(name))
        .ok_or_else(|| source_not_found(name).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_years_are_ascending_and_complete() {
        let years: Vec<u16> = tabular_sources().iter().map(|s| s.year).collect();
        assert_eq!(years, (2015..=2024).collect::<Vec<_>>());
    }

    #[test]
    fn tabular_file_name() {
        let source = tabular_sources()[0];
        assert_eq!(source.file_name(), "boston-311-2015.csv");
    }

    #[test]
    fn spatial_filter_runs_first() {
        assert_eq!(
            resource_names(),
            vec![
                "massachusetts_zip_boundaries",
                "boston_neighborhood_boundaries",
                "live_street_address_management_sam_addresses",
            ]
        );
    }

    #[test]
    fn massachusetts_job_filters_zctas_by_state() {
        let job = spatial_filter_jobs()[0];
        assert_eq!(job.layer.name, "tl_2024_us_zcta520");
        assert_eq!(job.boundary.name, "tl_2024_us_state");
        assert_eq!(job.boundary_column, "STUSPS");
        assert_eq!(job.boundary_code, "MA");
    }

    #[test]
    fn find_resource_is_case_insensitive() {
        let task = find_resource("Boston_Neighborhood_Boundaries").unwrap();
        assert_eq!(task.output_name(), "boston_neighborhood_boundaries");
        assert!(matches!(task, GeoTask::Single(_)));
        assert!(find_resource("parcels").is_err());
    }
}
