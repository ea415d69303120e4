//! Streaming HTTP downloads.
//!
//! Network access goes through the [`Downloader`] trait so the fetch and
//! prepare jobs can run against an in-memory backend in tests. The production
//! backend, [`HttpDownloader`], streams the response body to disk chunk by
//! chunk and reports progress with an `indicatif` bar.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use tokio::io::AsyncWriteExt;

use crate::error::{FetchError, IoErrorExt, Result, create_dir_all};

/// `User-Agent` header sent with every request.
pub const USER_AGENT: &str = concat!("civicetl/", env!("CARGO_PKG_VERSION"));

/// Fetches a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `dest`, returning the number of bytes written.
    ///
    /// Implementations must leave `dest` untouched on failure: either the
    /// complete body is written or no file appears.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Options for [`HttpDownloader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Verify server TLS certificates. Off by default because some upstream
    /// endpoints serve incomplete certificate chains.
    pub verify_tls: bool,
    /// Draw a progress bar while downloading.
    pub show_progress: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            verify_tls: false,
            show_progress: true,
        }
    }
}

/// [`Downloader`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpDownloader {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new(options: DownloadOptions) -> Result<Self> {
        if !options.verify_tls {
            warn!("TLS certificate verification is disabled");
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            show_progress: options.show_progress,
        })
    }

    async fn stream_to(&self, url: &str, part: &Path, label: &str) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let bar = progress_bar(response.content_length(), label, self.show_progress);
        let mut file = tokio::fs::File::create(part)
            .await
            .with_write_context("download", part)?;

        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Stream {
                url: url.to_string(),
                received,
                source,
            })?;
            file.write_all(&chunk)
                .await
                .with_write_context("download", part)?;
            received += chunk.len() as u64;
            bar.set_position(received);
        }
        file.flush().await.with_write_context("download", part)?;
        bar.finish_and_clear();
        Ok(received)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        let part = partial_path(dest);
        let label = dest
            .file_name()
            .map_or_else(|| url.to_string(), |n| n.to_string_lossy().into_owned());

        debug!("GET {url} -> {}", part.display());
        match self.stream_to(url, &part, &label).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .with_write_context("download", dest)?;
                debug!("Saved {bytes} bytes to {}", dest.display());
                Ok(bytes)
            },
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove {}: {cleanup}", part.display());
                    }
                }
                Err(e)
            },
        }
    }
}

/// `<dest>.part`, the in-progress name of a download.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn progress_bar(total: Option<u64>, label: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let (bar, template) = match total {
        Some(len) => (
            ProgressBar::new(len),
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{spinner:.green} {msg} [{elapsed_precise}] {bytes} ({bytes_per_sec})",
        ),
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.set_message(label.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("data/raw/boston-311-2015.csv")),
            PathBuf::from("data/raw/boston-311-2015.csv.part")
        );
    }

    #[test]
    fn user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("civicetl/"));
    }

    #[test]
    fn client_builds_with_and_without_verification() {
        for verify_tls in [true, false] {
            let options = DownloadOptions {
                verify_tls,
                show_progress: false,
            };
            assert!(HttpDownloader::new(options).is_ok());
        }
    }

    #[tokio::test]
    async fn unreachable_host_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        let downloader = HttpDownloader::new(DownloadOptions {
            verify_tls: true,
            show_progress: false,
        })
        .unwrap();

        // Port 9 (discard) on localhost refuses connections in test environments.
        let err = downloader
            .download("http://127.0.0.1:9/none.csv", &dest)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::CivicEtlError::Fetch(FetchError::Transport { .. })
        ));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }
}
