//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Per-post workspace storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per post.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Idle time after which a post workspace is deleted.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// How often the reaper scans the storage root.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

/// Playlist and segment fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Maximum segment downloads in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure (0 disables retry).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base backoff between attempts, doubled per retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// ffmpeg trim/re-encode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfig {
    /// Start offset passed to `-ss` when trimming the combined file.
    #[serde(default = "default_trim_start")]
    pub trim_start: String,
    /// x264 preset for the mp4 re-encode.
    #[serde(default = "default_preset")]
    pub preset: String,
    /// x264 CRF for the mp4 re-encode.
    #[serde(default = "default_crf")]
    pub crf: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            trim_start: default_trim_start(),
            preset: default_preset(),
            crf: default_crf(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("videos")
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_reap_interval_secs() -> u64 {
    15 * 60
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_trim_start() -> String {
    "00:00:00.5".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_crf() -> u32 {
    23
}
