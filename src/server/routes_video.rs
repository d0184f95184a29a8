//! Video API routes.
//!
//! `POST /api/probe` resolves a post URL into its metadata and available
//! renditions; `POST /api/download` runs the download pipeline; `GET
//! /videos/{post_id}/{file}` serves a finished deliverable as an attachment.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::AppContext;
use crate::assemble::OutputFormat;
use crate::bsky::{MetadataError, PostRef};
use crate::fetch::FetchError;
use crate::pipeline::{DownloadRequest, PipelineError};
use crate::workspace::WorkspaceError;

/// Create the video API routes.
pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/probe", post(probe_post))
        .route("/download", post(download_post))
}

/// Create the deliverable file-serving routes.
pub fn video_routes() -> Router<AppContext> {
    Router::new().route("/:post_id/:file", get(serve_video))
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub profile: String,
    pub post_id: String,
    pub thumbnail: Option<String>,
    pub like_count: i64,
    pub reply_count: i64,
    pub repost_count: i64,
    /// Renditions advertised by the master playlist, as `WxH` labels.
    pub resolutions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequestBody {
    pub profile: String,
    pub post_id: String,
    pub resolution: String,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub status: &'static str,
    pub filename: String,
    /// Path to fetch the deliverable from this server.
    pub url: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// API error: a status code plus a single terminal message for the job.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        let status = match &err {
            MetadataError::InvalidPostUrl(_) => StatusCode::BAD_REQUEST,
            MetadataError::MissingField { .. } => StatusCode::NOT_FOUND,
            MetadataError::Request(_) | MetadataError::Status { .. } => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::Metadata(MetadataError::InvalidPostUrl(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Metadata(MetadataError::MissingField { .. }) => StatusCode::NOT_FOUND,
            PipelineError::Metadata(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Playlist(skygrab_hls::Error::InvalidResolutionFormat(_)) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Playlist(skygrab_hls::Error::ResolutionNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            PipelineError::Playlist(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Fetch(FetchError::Manifest { .. })
            | PipelineError::Fetch(FetchError::ManifestStatus { .. })
            | PipelineError::Fetch(FetchError::Segment { .. })
            | PipelineError::Fetch(FetchError::SegmentStatus { .. }) => StatusCode::BAD_GATEWAY,
            PipelineError::Fetch(FetchError::SegmentWrite { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Workspace(WorkspaceError::InvalidJobId(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Workspace(WorkspaceError::Io(_))
            | PipelineError::Assembly(_)
            | PipelineError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Resolve a post URL into metadata plus the renditions it offers.
async fn probe_post(
    State(ctx): State<AppContext>,
    Json(request): Json<ProbeRequest>,
) -> Result<Json<ProbeResponse>, ApiError> {
    if request.url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    let post = PostRef::parse(&request.url)?;
    let metadata = ctx
        .bsky
        .fetch_post_metadata(&post.profile, &post.post_id)
        .await?;
    let resolutions = ctx
        .pipeline
        .available_resolutions(&metadata.playlist_url)
        .await?;

    Ok(Json(ProbeResponse {
        profile: post.profile,
        post_id: post.post_id,
        thumbnail: metadata.thumbnail_url,
        like_count: metadata.like_count,
        reply_count: metadata.reply_count,
        repost_count: metadata.repost_count,
        resolutions,
    }))
}

/// Run one download job and answer with the deliverable's URL.
async fn download_post(
    State(ctx): State<AppContext>,
    Json(body): Json<DownloadRequestBody>,
) -> Result<Json<DownloadResponse>, ApiError> {
    if body.profile.is_empty() || body.post_id.is_empty() || body.resolution.is_empty() {
        return Err(ApiError::bad_request(
            "profile, post_id, and resolution are required",
        ));
    }

    let request = DownloadRequest {
        profile: body.profile,
        post_id: body.post_id.clone(),
        resolution: body.resolution,
        format: body.format,
    };
    let outcome = ctx.pipeline.run_download(&request).await?;

    Ok(Json(DownloadResponse {
        status: "success",
        filename: outcome.file_name.clone(),
        url: format!("/videos/{}/{}", body.post_id, outcome.file_name),
    }))
}

/// Serve a finished deliverable as an attachment.
async fn serve_video(
    State(ctx): State<AppContext>,
    Path((post_id, file)): Path<(String, String)>,
) -> Result<Response, StatusCode> {
    // Route parameters cannot contain '/', but reject dot segments too so
    // nothing outside the storage root is ever reachable.
    for part in [&post_id, &file] {
        if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let path = ctx.workspaces.root().join(&post_id).join(&file);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    if !metadata.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }

    let content_type = if file.ends_with(".ts") {
        "video/mp2t"
    } else {
        "video/mp4"
    };

    let handle = File::open(&path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    let body = Body::from_stream(ReaderStream::new(handle));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file}\""),
        )
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
