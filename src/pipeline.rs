//! Download pipeline orchestration.
//!
//! One job runs the full chain to completion or first failure on its own
//! task: metadata -> master playlist -> variant resolution -> media playlist
//! -> segment fan-out -> concat -> trim. Every stage fails closed; the
//! caller gets a single stage-qualified error and a partially populated
//! workspace is left for the reaper.

use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::assemble::{self, AssembleError, OutputFormat};
use crate::bsky::{BskyClient, MetadataError};
use crate::config::EncoderConfig;
use crate::fetch::{FetchError, Fetcher};
use crate::workspace::{WorkspaceError, WorkspaceRoot};
use skygrab_hls::{parse_master, parse_media, resolve_variant};

/// Error type covering every pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Playlist(#[from] skygrab_hls::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Assembly(#[from] AssembleError),

    #[error("assembly task panicked: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Parameters of one download job.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub profile: String,
    pub post_id: String,
    /// Requested rendition as `WxH`.
    pub resolution: String,
    pub format: OutputFormat,
}

/// The finished deliverable of a download job.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// File name inside the job's workspace.
    pub file_name: String,
    pub path: PathBuf,
}

/// File name of the final deliverable for a post.
pub fn deliverable_name(post_id: &str, format: OutputFormat) -> String {
    format!("{post_id}_skygrab.{}", format.extension())
}

/// The download pipeline with its collaborators.
#[derive(Clone)]
pub struct Pipeline {
    bsky: BskyClient,
    fetcher: Fetcher,
    workspaces: WorkspaceRoot,
    encoder: EncoderConfig,
}

impl Pipeline {
    pub fn new(
        bsky: BskyClient,
        fetcher: Fetcher,
        workspaces: WorkspaceRoot,
        encoder: EncoderConfig,
    ) -> Self {
        Self {
            bsky,
            fetcher,
            workspaces,
            encoder,
        }
    }

    /// List the renditions a post's master playlist advertises.
    pub async fn available_resolutions(
        &self,
        playlist_url: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let master = self.fetcher.fetch_playlist(playlist_url).await?;
        Ok(parse_master(&master.text).map(|v| v.label()).collect())
    }

    /// Run one download job end to end.
    pub async fn run_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadOutcome, PipelineError> {
        info!(
            profile = %request.profile,
            post_id = %request.post_id,
            resolution = %request.resolution,
            format = %request.format,
            "Starting download job"
        );

        let metadata = self
            .bsky
            .fetch_post_metadata(&request.profile, &request.post_id)
            .await?;

        self.download_from_playlist(
            &metadata.playlist_url,
            &request.resolution,
            &request.post_id,
            request.format,
        )
        .await
    }

    /// Run the manifest-to-deliverable chain for a known master playlist.
    pub async fn download_from_playlist(
        &self,
        playlist_url: &str,
        resolution: &str,
        post_id: &str,
        format: OutputFormat,
    ) -> Result<DownloadOutcome, PipelineError> {
        let master = self.fetcher.fetch_playlist(playlist_url).await?;
        let variant_url =
            resolve_variant(parse_master(&master.text), resolution, &master.base_url)?;
        info!(%variant_url, "Resolved variant");

        let media = self.fetcher.fetch_playlist(&variant_url).await?;
        let segments = parse_media(&media.text, &media.base_url)?;

        let workspace = self.workspaces.ensure(post_id)?;
        let files = self
            .fetcher
            .download_segments(&segments, workspace.dir())
            .await?;

        let file_name = deliverable_name(post_id, format);
        let output_path = workspace.dir().join(&file_name);

        // ffmpeg runs are blocking; keep them off the async workers.
        let dir = workspace.dir().to_path_buf();
        let id = post_id.to_string();
        let encoder = self.encoder.clone();
        let deliverable = output_path.clone();
        tokio::task::spawn_blocking(move || {
            let combined = assemble::concat_segments(&dir, &id, &files)?;
            assemble::trim_video(&combined, &deliverable, format, &encoder)
        })
        .await??;

        info!(path = %output_path.display(), "Download job complete");
        Ok(DownloadOutcome {
            file_name,
            path: output_path,
        })
    }
}
