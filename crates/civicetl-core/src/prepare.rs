//! Geospatial preparers: zipped shapefiles in, GeoParquet out.
//!
//! Every preparer is idempotent on its output. When `<processed>/<name>.parquet`
//! exists, nothing is downloaded or written. Otherwise the archive is
//! downloaded into the raw directory, extracted to `<raw>/<name>/`, converted,
//! and both the archive and the extraction directory are removed. Cleanup only
//! happens after the output has been written; a failure leaves the raw files in
//! place for inspection.

use std::path::{Path, PathBuf};

use geotable::{GeoTable, Predicate, read_shapefile, sjoin, write_geoparquet};
use log::{error, info, warn};

use crate::archive::{extract, locate_geometry_file};
use crate::download::Downloader;
use crate::error::{Result, remove_dir_all, remove_file};
use crate::layout::DataLayout;
use crate::sources::{GeoTask, Resource, SpatialFilterJob};

/// Result of preparing one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// The output already existed; nothing was done
    AlreadyPresent,
    /// The output was written
    Written {
        /// Number of features in the output
        rows: usize,
    },
}

/// Converts a single zipped shapefile to GeoParquet.
///
/// # Errors
///
/// Fails on download, extraction, shapefile or GeoParquet errors, and with
/// [`ArchiveError::NoGeometryFile`](crate::error::ArchiveError::NoGeometryFile)
/// when the archive holds no `.shp` file.
pub async fn prepare_single(
    layout: &DataLayout,
    resource: &Resource,
    downloader: &dyn Downloader,
) -> Result<PrepareOutcome> {
    let output = layout.processed_path(resource.name);
    if output_present(layout, resource.name, &output) {
        return Ok(PrepareOutcome::AlreadyPresent);
    }

    let archive = fetch_archive(layout, resource, downloader).await?;
    let table = unpack(layout, resource, &archive)?;
    let rows = save(layout, &table, &output)?;
    discard(layout, resource, &archive)?;
    Ok(PrepareOutcome::Written { rows })
}

/// Keeps the features of `job.layer` that intersect the selected boundary.
///
/// Both archives are downloaded before either is extracted. The layer is
/// reprojected into the boundary's CRS, joined against the boundary rows whose
/// `boundary_column` equals `boundary_code`, and stripped of every column the
/// join added.
///
/// # Errors
///
/// Fails like [`prepare_single`], and additionally when the boundary column is
/// missing or the layer cannot be reprojected.
pub async fn prepare_spatial_filter(
    layout: &DataLayout,
    job: &SpatialFilterJob,
    downloader: &dyn Downloader,
) -> Result<PrepareOutcome> {
    let output = layout.processed_path(job.output);
    if output_present(layout, job.output, &output) {
        return Ok(PrepareOutcome::AlreadyPresent);
    }

    let layer_archive = fetch_archive(layout, &job.layer, downloader).await?;
    let boundary_archive = fetch_archive(layout, &job.boundary, downloader).await?;
    let layer = unpack(layout, &job.layer, &layer_archive)?;
    let boundary = unpack(layout, &job.boundary, &boundary_archive)?;

    let layer = layer.to_crs(boundary.crs())?;
    let selected = boundary.filter_eq(job.boundary_column, job.boundary_code)?;
    if selected.is_empty() {
        warn!(
            "No {} feature has {} = '{}'",
            job.boundary.display_name, job.boundary_column, job.boundary_code
        );
    }
    info!(
        "FILTERING {} by {} {} = '{}'",
        job.layer.display_name, job.boundary.display_name, job.boundary_column, job.boundary_code
    );
    let joined = sjoin(&layer, &selected, Predicate::Intersects)?;
    let own = layer.column_names();
    let added: Vec<String> = joined
        .column_names()
        .into_iter()
        .filter(|name| !own.contains(name))
        .collect();
    let filtered = joined.drop_columns(added.as_slice())?;
    info!(
        "Kept {} of {} {} features",
        filtered.len(),
        layer.len(),
        job.layer.display_name
    );

    let rows = save(layout, &filtered, &output)?;
    discard(layout, &job.layer, &layer_archive)?;
    discard(layout, &job.boundary, &boundary_archive)?;
    Ok(PrepareOutcome::Written { rows })
}

/// Runs the preparer matching `task`.
///
/// # Errors
///
/// See [`prepare_single`] and [`prepare_spatial_filter`].
pub async fn prepare_task(
    layout: &DataLayout,
    task: &GeoTask,
    downloader: &dyn Downloader,
) -> Result<PrepareOutcome> {
    match task {
        GeoTask::SpatialFilter(job) => prepare_spatial_filter(layout, job, downloader).await,
        GeoTask::Single(resource) => prepare_single(layout, resource, downloader).await,
    }
}

/// Outcome for one [`GeoTask`].
#[derive(Debug)]
pub struct TaskOutcome {
    /// Output name
    pub name: &'static str,
    /// Output path
    pub path: PathBuf,
    /// What happened, or why it failed
    pub result: Result<PrepareOutcome>,
}

/// Results of [`prepare_all`], in processing order.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// One entry per task
    pub outcomes: Vec<TaskOutcome>,
}

impl PrepareReport {
    /// Tasks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Returns `true` when no task failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of outputs written during this run.
    #[must_use]
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(PrepareOutcome::Written { .. })))
            .count()
    }
}

/// Runs every task in order.
///
/// A failing task is logged and recorded; the remaining tasks still run.
pub async fn prepare_all(
    layout: &DataLayout,
    tasks: &[GeoTask],
    downloader: &dyn Downloader,
) -> PrepareReport {
    let mut report = PrepareReport::default();
    for task in tasks {
        let name = task.output_name();
        let result = prepare_task(layout, task, downloader).await;
        if let Err(e) = &result {
            error!("Failed to prepare {name}: {e}");
            if let Some(hint) = e.recovery_suggestion() {
                error!("  {hint}");
            }
        }
        report.outcomes.push(TaskOutcome {
            name,
            path: layout.processed_path(name),
            result,
        });
    }
    report
}

fn output_present(layout: &DataLayout, name: &str, output: &Path) -> bool {
    if layout.processed_present(name) {
        info!("FOUND {name}: '{}'", output.display());
        true
    } else {
        info!("NOT FOUND {name}: '{}'", output.display());
        false
    }
}

async fn fetch_archive(
    layout: &DataLayout,
    resource: &Resource,
    downloader: &dyn Downloader,
) -> Result<PathBuf> {
    layout.ensure_raw_dir()?;
    let archive = layout.archive_path(resource.name);
    info!(
        "DOWNLOADING {} from {} ({})",
        resource.display_name, resource.publisher, resource.info_url
    );
    downloader.download(resource.url, &archive).await?;
    Ok(archive)
}

fn unpack(layout: &DataLayout, resource: &Resource, archive: &Path) -> Result<GeoTable> {
    let scratch = layout.scratch_dir(resource.name);
    if scratch.exists() {
        remove_dir_all(&scratch)?;
    }
    info!("UNZIPPING '{}' to '{}'", archive.display(), scratch.display());
    extract(archive, &scratch)?;
    let shapefile = locate_geometry_file(&scratch)?;
    info!("READING '{}'", shapefile.display());
    Ok(read_shapefile(&shapefile)?)
}

fn save(layout: &DataLayout, table: &GeoTable, output: &Path) -> Result<usize> {
    layout.ensure_processed_dir()?;
    info!("CREATING GeoParquet with {} features", table.len());
    write_geoparquet(table, output)?;
    info!("SAVING '{}'", output.display());
    Ok(table.len())
}

fn discard(layout: &DataLayout, resource: &Resource, archive: &Path) -> Result<()> {
    let scratch = layout.scratch_dir(resource.name);
    info!("DELETING '{}' and '{}'", archive.display(), scratch.display());
    remove_file(archive)?;
    remove_dir_all(&scratch)
}
