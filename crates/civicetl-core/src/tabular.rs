//! Year-by-year fetcher for tabular (CSV) data.

use std::path::PathBuf;

use log::{error, info};

use crate::download::Downloader;
use crate::error::{CivicEtlError, Result};
use crate::layout::DataLayout;
use crate::sources::TabularSource;

/// What happened to one year.
#[derive(Debug)]
pub enum YearStatus {
    /// A non-empty local file already existed; nothing was requested
    Present,
    /// The file was downloaded
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// The download failed; later years were still attempted
    Failed {
        /// Why the download failed
        error: CivicEtlError,
    },
}

/// Outcome for one [`TabularSource`].
#[derive(Debug)]
pub struct YearOutcome {
    /// Calendar year
    pub year: u16,
    /// Local file path
    pub path: PathBuf,
    /// What happened
    pub status: YearStatus,
}

/// Per-year results of [`fetch_tabular`], in ascending year order.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// One entry per requested year
    pub outcomes: Vec<YearOutcome>,
}

impl FetchReport {
    /// Years whose download failed.
    pub fn failures(&self) -> impl Iterator<Item = &YearOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, YearStatus::Failed { .. }))
    }

    /// Returns `true` when no year failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of years downloaded during this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, YearStatus::Downloaded { .. }))
            .count()
    }
}

/// Ensures every year of `sources` exists locally.
///
/// Years are checked in ascending order. A non-empty local file is kept as-is
/// and costs no request; any other year is downloaded once. A failed download
/// is logged and recorded, and the remaining years are still processed.
///
/// # Errors
///
/// Only fails if the raw directory cannot be created. Download failures are
/// reported per year in the returned [`FetchReport`].
pub async fn fetch_tabular(
    layout: &DataLayout,
    sources: &[TabularSource],
    downloader: &dyn Downloader,
) -> Result<FetchReport> {
    layout.ensure_raw_dir()?;

    let mut ordered = sources.to_vec();
    ordered.sort_by_key(|s| s.year);

    info!("Checking available files in '{}'", layout.raw_dir().display());
    let mut missing = Vec::new();
    let mut report = FetchReport::default();
    for source in &ordered {
        let path = layout.tabular_path(source);
        if layout.tabular_present(source) {
            info!("FOUND {} data: '{}'", source.year, source.file_name());
            report.outcomes.push(YearOutcome {
                year: source.year,
                path,
                status: YearStatus::Present,
            });
        } else {
            info!("NOT FOUND {} data: '{}'", source.year, source.file_name());
            missing.push((source, path));
        }
    }

    for (source, path) in missing {
        info!(
            "DOWNLOADING '{}' to '{}'",
            source.file_name(),
            layout.raw_dir().display()
        );
        let status = match downloader.download(source.url, &path).await {
            Ok(bytes) => YearStatus::Downloaded { bytes },
            Err(e) => {
                error!("Failed to download data for {}: {e}", source.year);
                if let Some(hint) = e.recovery_suggestion() {
                    error!("  {hint}");
                }
                YearStatus::Failed { error: e }
            },
        };
        report.outcomes.push(YearOutcome {
            year: source.year,
            path,
            status,
        });
    }
    report.outcomes.sort_by_key(|o| o.year);

    Ok(report)
}
