//! Bluesky metadata collaborator.

mod client;
mod types;

pub use client::{BskyClient, MetadataError, PostRef};
pub use types::{AspectRatio, PostMetadata};
