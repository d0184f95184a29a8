//! Bluesky public API client.
//!
//! Resolves a post URL into its profile handle and post id, and fetches the
//! post's video metadata (master playlist URL, thumbnail, engagement
//! counters) from the public `getPostThread` endpoint.

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use super::types::{PostMetadata, ThreadResponse};

/// Default public API endpoint.
const DEFAULT_API_BASE: &str = "https://public.api.bsky.app/xrpc";

/// Connection timeout for metadata API requests
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for metadata resolution.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The post URL did not contain `/profile/{handle}/post/{id}`.
    #[error("invalid post URL: {0}")]
    InvalidPostUrl(String),

    /// Transport-level failure talking to the metadata API.
    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The metadata API answered with a non-success status.
    #[error("metadata API returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// A field the service needs was absent from the response.
    #[error("metadata response missing field: {path}")]
    MissingField { path: &'static str },
}

/// A post reference extracted from a Bluesky URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub profile: String,
    pub post_id: String,
}

impl PostRef {
    /// Extract the profile handle and post id from a post URL.
    pub fn parse(url: &str) -> Result<Self, MetadataError> {
        static POST_URL: OnceLock<Regex> = OnceLock::new();
        let re = POST_URL
            .get_or_init(|| Regex::new(r"/profile/([^/]+)/post/([^/]+)").expect("valid regex"));

        let caps = re
            .captures(url)
            .ok_or_else(|| MetadataError::InvalidPostUrl(url.to_string()))?;
        Ok(Self {
            profile: caps[1].to_string(),
            post_id: caps[2].to_string(),
        })
    }
}

/// Client for the Bluesky public API.
#[derive(Clone)]
pub struct BskyClient {
    client: Client,
    api_base: String,
}

impl BskyClient {
    /// Create a client against the public API endpoint.
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string())
    }

    /// Create a client against a custom endpoint (used by tests).
    pub fn with_api_base(api_base: String) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch video metadata for a post.
    ///
    /// Fails with [`MetadataError::MissingField`] when the response carries
    /// no video embed or no playlist URL; engagement counters default to
    /// zero when absent.
    pub async fn fetch_post_metadata(
        &self,
        profile: &str,
        post_id: &str,
    ) -> Result<PostMetadata, MetadataError> {
        let uri = format!("at://{profile}/app.bsky.feed.post/{post_id}");
        let url = format!("{}/app.bsky.feed.getPostThread", self.api_base);
        tracing::debug!(%uri, "Fetching post metadata");

        let response = self
            .client
            .get(&url)
            .query(&[("uri", uri.as_str()), ("depth", "0")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status { status, body });
        }

        let thread: ThreadResponse = response.json().await?;

        let post = thread
            .thread
            .ok_or(MetadataError::MissingField { path: "thread" })?
            .post
            .ok_or(MetadataError::MissingField {
                path: "thread.post",
            })?;
        let embed = post.embed.ok_or(MetadataError::MissingField {
            path: "thread.post.embed",
        })?;
        let playlist_url = embed.playlist.ok_or(MetadataError::MissingField {
            path: "thread.post.embed.playlist",
        })?;

        Ok(PostMetadata {
            playlist_url,
            thumbnail_url: embed.thumbnail,
            like_count: post.like_count.unwrap_or(0),
            reply_count: post.reply_count.unwrap_or(0),
            repost_count: post.repost_count.unwrap_or(0),
            aspect_ratio: embed.aspect_ratio,
        })
    }
}

impl Default for BskyClient {
    fn default() -> Self {
        Self::new()
    }
}
