//! Custom error types for `civicetl` operations.
//!
//! Every fallible operation in this crate returns [`CivicEtlError`], which groups
//! the domain-specific failures (network fetches, archive handling, filesystem
//! access, geometry processing and dataset inspection) and knows how to render
//! them for end users together with a recovery hint.

use std::path::PathBuf;

use geotable::GeoTableError;
use thiserror::Error;

/// Main error type for `civicetl` operations.
///
/// Delegates display formatting to the underlying domain error.
#[derive(Debug, Error)]
pub enum CivicEtlError {
    /// Network and HTTP failures while downloading a resource
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Zip archive reading and extraction failures
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// I/O errors (file read/write/remove, directory creation)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Shapefile loading, reprojection, joins and GeoParquet output
    #[error(transparent)]
    GeoTable(#[from] GeoTableError),

    /// `DataFusion` errors while inspecting a dataset
    #[error(transparent)]
    DataFusion(#[from] DataFusionError),

    /// Lookup failures in the static resource registry
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Network errors.
///
/// Raised by a [`Downloader`](crate::download::Downloader) when a resource
/// cannot be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or no response was received
    #[error("Request to '{url}' failed: {source}")]
    Transport {
        /// The requested URL
        url: String,
        /// The underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("Server returned HTTP {status} for '{url}'")]
    Status {
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body was interrupted mid-transfer
    #[error("Download of '{url}' was interrupted after {received} bytes: {source}")]
    Stream {
        /// The requested URL
        url: String,
        /// Bytes received before the failure
        received: u64,
        /// The underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be configured
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Zip archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The file is not a readable zip archive
    #[error("Failed to open archive '{path}': {source}")]
    Open {
        /// The archive path
        path: PathBuf,
        /// The underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// One or more entries could not be extracted
    #[error("Failed to extract '{path}' into '{destination}': {source}")]
    Extract {
        /// The archive path
        path: PathBuf,
        /// The extraction directory
        destination: PathBuf,
        /// The underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// Extraction succeeded but no geometry file was found
    #[error("No .{extension} file found in '{directory}'")]
    NoGeometryFile {
        /// The extraction directory that was searched
        directory: PathBuf,
        /// The extension searched for
        extension: String,
    },
}

/// I/O related errors.
///
/// These errors occur during file and directory operations on the raw and
/// processed data directories.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {what} '{path}': {source}")]
    Read {
        /// What was being read (e.g., "download", "CSV file")
        what: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {what} '{path}': {source}")]
    Write {
        /// What was being written
        what: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to delete a file or directory
    #[error("Failed to remove '{path}': {source}")]
    Remove {
        /// The path being removed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The directory path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },

    /// The file type cannot be handled
    #[error("Unsupported file type '{path}': {reason}")]
    UnsupportedFile {
        /// The file path
        path: PathBuf,
        /// Why it cannot be handled
        reason: String,
    },
}

/// DataFusion-specific errors.
#[derive(Debug, Error)]
pub enum DataFusionError {
    /// Query execution failed
    #[error("Query execution failed: {0}")]
    Query(#[from] datafusion::error::DataFusionError),
}

/// Resource registry errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No resource with this name is registered
    #[error("Resource '{name}' not found. Available resources: {available}")]
    NotFound {
        /// The requested name
        name: String,
        /// Comma-separated list of registered names
        available: String,
    },
}

/// Type alias for Results using `CivicEtlError`.
pub type Result<T> = std::result::Result<T, CivicEtlError>;

impl CivicEtlError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(e) => e.user_message(),
            Self::Archive(e) => e.user_message(),
            Self::Io(e) => e.user_message(),
            Self::GeoTable(e) => format!("Geometry processing failed: {e}"),
            Self::DataFusion(e) => format!("Query error: {e}"),
            Self::Source(e) => e.user_message(),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Fetch(e) => e.recovery_suggestion(),
            Self::Archive(e) => e.recovery_suggestion(),
            Self::Io(e) => e.recovery_suggestion(),
            Self::GeoTable(GeoTableError::UnsupportedReprojection { .. }) => Some(
                "The layer's .prj describes a coordinate system that cannot be reprojected."
                    .to_string(),
            ),
            Self::Source(_) => Some("Run 'civicetl sources' to list resources.".to_string()),
            Self::GeoTable(_) | Self::DataFusion(_) => None,
        }
    }
}

impl FetchError {
    fn user_message(&self) -> String {
        match self {
            Self::Status { url, status } => {
                format!("Download failed with HTTP {status}.\n  URL: {url}")
            },
            Self::Transport { url, .. } => format!("Could not reach the server.\n  URL: {url}"),
            Self::Stream { url, received, .. } => {
                format!("Download interrupted after {received} bytes.\n  URL: {url}")
            },
            Self::Client(_) => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Status { status: 404, .. } => Some(
                "The resource may have moved; check the dataset's info page for a new link."
                    .to_string(),
            ),
            Self::Status { .. } | Self::Transport { .. } | Self::Stream { .. } => {
                Some("Check your network connection and run the command again.".to_string())
            },
            Self::Client(_) => None,
        }
    }
}

impl ArchiveError {
    fn user_message(&self) -> String {
        match self {
            Self::NoGeometryFile {
                directory,
                extension,
            } => format!(
                "The downloaded archive has no .{extension} file.\n  Extracted to: {}",
                directory.display()
            ),
            Self::Open { .. } | Self::Extract { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Open { path, .. } => Some(format!(
                "The download may be incomplete; delete '{}' and run again.",
                path.display()
            )),
            Self::NoGeometryFile { directory, .. } => Some(format!(
                "Inspect '{}' and the upstream archive contents.",
                directory.display()
            )),
            Self::Extract { .. } => Some("Check free disk space and permissions.".to_string()),
        }
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { what, path, .. } => {
                format!("Failed to read {what}: {}", path.display())
            },
            Self::Write { what, path, .. } => {
                format!("Failed to write {what}: {}", path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
            _ => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            Self::Write { .. } | Self::CreateDir { .. } | Self::Remove { .. } => {
                Some("Check directory permissions and free disk space.".to_string())
            },
            Self::UnsupportedFile { .. } => {
                Some("Only .csv and .parquet files can be inspected.".to_string())
            },
            Self::Read { .. } => None,
        }
    }
}

impl SourceError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound { name, available } => format!(
                "Resource '{name}' not found.\n\nAvailable resources:\n{}",
                available
                    .split(", ")
                    .map(|d| format!("  - {d}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            CivicEtlError::Io(IoError::Read {
                what: what.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, what: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            CivicEtlError::Io(IoError::Write {
                what: what.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Creates `dir` and its parents.
///
/// # Errors
///
/// Returns an [`IoError::CreateDir`] on failure.
pub fn create_dir_all(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| {
        IoError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Removes a file.
///
/// # Errors
///
/// Returns an [`IoError::Remove`] on failure.
pub fn remove_file(path: &std::path::Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|source| {
        IoError::Remove {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Removes a directory tree.
///
/// # Errors
///
/// Returns an [`IoError::Remove`] on failure.
pub fn remove_dir_all(path: &std::path::Path) -> Result<()> {
    std::fs::remove_dir_all(path).map_err(|source| {
        IoError::Remove {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Helper to create `SourceError::NotFound` with the registered names.
#[must_use]
pub fn source_not_found(name: &str) -> SourceError {
    SourceError::NotFound {
        name: name.to_string(),
        available: crate::sources::resource_names().join(", "),
    }
}
