//! Zip extraction and geometry file discovery.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ArchiveError, IoErrorExt, Result};

/// Extension of the geometry file inside a shapefile archive.
pub const GEOMETRY_EXTENSION: &str = "shp";

/// Extracts every entry of the zip at `archive` into `destination`.
///
/// Returns the number of entries in the archive. Entry paths that would escape
/// `destination` are rejected by the zip reader.
///
/// # Errors
///
/// Returns [`ArchiveError::Open`] if `archive` is not a zip file and
/// [`ArchiveError::Extract`] if an entry cannot be written.
pub fn extract(archive: &Path, destination: &Path) -> Result<usize> {
    let file = File::open(archive).with_read_context("archive", archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let entries = zip.len();
    zip.extract(destination)
        .map_err(|source| ArchiveError::Extract {
            path: archive.to_path_buf(),
            destination: destination.to_path_buf(),
            source,
        })?;
    debug!(
        "Extracted {entries} entries from {} into {}",
        archive.display(),
        destination.display()
    );
    Ok(entries)
}

/// Finds the geometry file at the top level of `directory`.
///
/// Matching is case-insensitive on the extension; when several files match,
/// the first in sorted order wins.
///
/// # Errors
///
/// Returns [`ArchiveError::NoGeometryFile`] when nothing matches, or an I/O
/// error if the directory cannot be listed.
pub fn locate_geometry_file(directory: &Path) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(directory).with_read_context("directory", directory)? {
        let path = entry.with_read_context("directory", directory)?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(GEOMETRY_EXTENSION));
        if matches && path.is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();
    if candidates.len() > 1 {
        debug!(
            "{} geometry files in {}, using the first",
            candidates.len(),
            directory.display()
        );
    }
    candidates.into_iter().next().ok_or_else(|| {
        ArchiveError::NoGeometryFile {
            directory: directory.to_path_buf(),
            extension: GEOMETRY_EXTENSION.to_string(),
        }
        .into()
    })
}
