//! Typed `app.bsky.feed.getPostThread` response structures.
//!
//! Every level of nesting the service reads is an explicit `Option`, so a
//! missing field surfaces as a `MissingField` error naming its path instead
//! of a panic or a silent null.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadResponse {
    pub thread: Option<Thread>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thread {
    pub post: Option<Post>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Post {
    pub embed: Option<Embed>,
    pub like_count: Option<i64>,
    pub reply_count: Option<i64>,
    pub repost_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Embed {
    pub playlist: Option<String>,
    pub thumbnail: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
}

/// Advertised video aspect ratio, when the post carries one.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

/// Metadata for one video post, as consumed by the pipeline and the API.
#[derive(Debug, Clone)]
pub struct PostMetadata {
    /// Master playlist URL. The only field the download pipeline needs.
    pub playlist_url: String,
    pub thumbnail_url: Option<String>,
    pub like_count: i64,
    pub reply_count: i64,
    pub repost_count: i64,
    pub aspect_ratio: Option<AspectRatio>,
}
