//! Playlist and segment fetching.
//!
//! Playlists are fetched as text along with their effective base URL so
//! relative references can be resolved. Segments fan out with a bounded
//! number of downloads in flight; each one is written to an ordinal-named
//! file, so reassembly order never depends on completion order. Any single
//! failure aborts the whole job.
//!
//! Transient failures (transport errors, 5xx) are retried a bounded number
//! of times with doubling backoff; 4xx responses fail immediately.

use reqwest::{Client, StatusCode};
use skygrab_hls::{base_of, SegmentDescriptor};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;

/// Error type for playlist and segment fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure fetching a playlist.
    #[error("failed to fetch playlist {url}: {source}")]
    Manifest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status fetching a playlist.
    #[error("playlist {url} returned status {status}")]
    ManifestStatus { url: String, status: StatusCode },

    /// Transport failure fetching one segment.
    #[error("failed to fetch segment {index}: {source}")]
    Segment {
        index: usize,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status fetching one segment.
    #[error("segment {index} ({url}) returned status {status}")]
    SegmentStatus {
        index: usize,
        url: String,
        status: StatusCode,
    },

    /// The segment body could not be written to its workspace file.
    #[error("failed to write segment {index} to {path:?}: {source}")]
    SegmentWrite {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A playlist document plus the base URL its references resolve against.
#[derive(Debug, Clone)]
pub struct PlaylistDocument {
    pub text: String,
    /// Effective URL the document was served from (after redirects),
    /// truncated after its final path separator.
    pub base_url: String,
}

/// One downloaded segment file, named from its manifest ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub ordinal: usize,
    pub path: PathBuf,
}

/// Local file name for a segment ordinal. Ordinals are unique per manifest,
/// so names cannot collide within one job.
pub fn segment_file_name(ordinal: usize) -> String {
    format!("segment-{ordinal}.ts")
}

/// Outcome of one HTTP attempt, before retry classification.
enum AttemptError {
    Transport(reqwest::Error),
    Status(StatusCode),
}

impl AttemptError {
    /// 4xx responses are not worth retrying; transport errors and 5xx are.
    fn is_transient(&self) -> bool {
        match self {
            AttemptError::Transport(_) => true,
            AttemptError::Status(status) => status.is_server_error(),
        }
    }
}

/// HTTP fetcher for playlists and media segments.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    concurrency: usize,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            concurrency: config.concurrency.max(1),
            retry_attempts: config.retry_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// GET a URL, retrying transient failures with doubling backoff.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, AttemptError> {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0u32;

        loop {
            let outcome = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => AttemptError::Status(response.status()),
                Err(e) => AttemptError::Transport(e),
            };

            if attempt >= self.retry_attempts || !outcome.is_transient() {
                return Err(outcome);
            }

            attempt += 1;
            warn!(url, attempt, "Transient fetch failure, retrying");
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    /// Fetch a playlist document (master or variant).
    pub async fn fetch_playlist(&self, url: &str) -> Result<PlaylistDocument, FetchError> {
        debug!(url, "Fetching playlist");
        let response = self.get_with_retry(url).await.map_err(|e| match e {
            AttemptError::Transport(source) => FetchError::Manifest {
                url: url.to_string(),
                source,
            },
            AttemptError::Status(status) => FetchError::ManifestStatus {
                url: url.to_string(),
                status,
            },
        })?;

        // The effective URL (after any redirect) is what relative
        // references resolve against, not the URL we asked for.
        let base_url = base_of(response.url().as_str()).to_string();
        let text = response.text().await.map_err(|source| FetchError::Manifest {
            url: url.to_string(),
            source,
        })?;

        Ok(PlaylistDocument { text, base_url })
    }

    /// Download every segment into `dir`, bounded-concurrently.
    ///
    /// Returns the segment files sorted by ascending ordinal regardless of
    /// completion order. The first failure aborts remaining downloads and
    /// fails the job; already-written files are left for the reaper.
    pub async fn download_segments(
        &self,
        segments: &[SegmentDescriptor],
        dir: &Path,
    ) -> Result<Vec<SegmentFile>, FetchError> {
        use futures::stream::{self, StreamExt};

        debug!(count = segments.len(), dir = %dir.display(), "Downloading segments");

        let mut downloads = stream::iter(segments.iter().cloned().map(|segment| {
            let path = dir.join(segment_file_name(segment.ordinal));
            async move {
                self.download_segment(&segment, &path).await?;
                Ok::<_, FetchError>(SegmentFile {
                    ordinal: segment.ordinal,
                    path,
                })
            }
        }))
        .buffer_unordered(self.concurrency);

        let mut files = Vec::with_capacity(segments.len());
        while let Some(result) = downloads.next().await {
            files.push(result?);
        }

        files.sort_by_key(|f| f.ordinal);
        Ok(files)
    }

    async fn download_segment(
        &self,
        segment: &SegmentDescriptor,
        path: &Path,
    ) -> Result<(), FetchError> {
        let index = segment.ordinal;
        let response = self
            .get_with_retry(&segment.url)
            .await
            .map_err(|e| match e {
                AttemptError::Transport(source) => FetchError::Segment { index, source },
                AttemptError::Status(status) => FetchError::SegmentStatus {
                    index,
                    url: segment.url.clone(),
                    status,
                },
            })?;

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Segment { index, source })?;

        tokio::fs::write(path, &body)
            .await
            .map_err(|source| FetchError::SegmentWrite {
                index,
                path: path.to_path_buf(),
                source,
            })?;

        debug!(index, bytes = body.len(), "Segment written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_file_name_uses_ordinal() {
        assert_eq!(segment_file_name(0), "segment-0.ts");
        assert_eq!(segment_file_name(41), "segment-41.ts");
    }

    #[test]
    fn test_status_transience() {
        assert!(AttemptError::Status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(!AttemptError::Status(StatusCode::NOT_FOUND).is_transient());
        assert!(!AttemptError::Status(StatusCode::FORBIDDEN).is_transient());
    }
}
