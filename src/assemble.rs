//! Segment assembly: lossless concatenation and trim/re-encode.
//!
//! Writes the ffmpeg concat manifest (`segments.txt`) in strict ascending
//! ordinal order and shells out to ffmpeg twice: once with `-f concat -c
//! copy` to produce the combined file, once to trim the start and re-encode
//! into the requested container. Both invocations are blocking and must be
//! run off the request path (the pipeline wraps them in `spawn_blocking`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EncoderConfig;
use crate::fetch::SegmentFile;

/// File name of the concat manifest inside a workspace.
pub const CONCAT_MANIFEST: &str = "segments.txt";

/// Error type for assembly steps.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// The concat manifest could not be written.
    #[error("failed to write concat manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ffmpeg could not be spawned at all.
    #[error("failed to execute ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    /// Lossless concatenation exited non-zero.
    #[error("segment concatenation failed: {stderr}")]
    Concat { stderr: String },

    /// Trim/re-encode exited non-zero.
    #[error("trim/re-encode failed: {stderr}")]
    Trim { stderr: String },
}

/// Target container for the final deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Ts,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Ts => "ts",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Mp4
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(OutputFormat::Mp4),
            "ts" => Ok(OutputFormat::Ts),
            other => Err(format!("unsupported format {other:?} (expected mp4 or ts)")),
        }
    }
}

/// Write the concat manifest for the downloaded segments.
///
/// One `file '...'` directive per segment, in ascending ordinal order. This
/// line order alone determines playback order of the combined output, so the
/// input is re-sorted here rather than trusting the caller.
pub fn write_concat_manifest(dir: &Path, files: &[SegmentFile]) -> Result<PathBuf, AssembleError> {
    let path = dir.join(CONCAT_MANIFEST);

    let mut ordered: Vec<&SegmentFile> = files.iter().collect();
    ordered.sort_by_key(|f| f.ordinal);

    let mut manifest = String::new();
    for file in &ordered {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| crate::fetch::segment_file_name(file.ordinal));
        manifest.push_str(&format!("file '{name}'\n"));
    }

    std::fs::File::create(&path)
        .and_then(|mut f| f.write_all(manifest.as_bytes()))
        .map_err(|source| AssembleError::Manifest {
            path: path.clone(),
            source,
        })?;

    debug!(path = %path.display(), segments = ordered.len(), "Wrote concat manifest");
    Ok(path)
}

/// Losslessly concatenate the segments listed in the manifest.
///
/// Produces `{post_id}.mp4` inside the workspace. On a non-zero ffmpeg exit
/// the partial output, if any, is removed before the error is returned.
pub fn concat_segments(
    dir: &Path,
    post_id: &str,
    files: &[SegmentFile],
) -> Result<PathBuf, AssembleError> {
    let manifest_path = write_concat_manifest(dir, files)?;
    let output_path = dir.join(format!("{post_id}.mp4"));

    debug!(
        manifest = %manifest_path.display(),
        output = %output_path.display(),
        "Running ffmpeg concat"
    );

    let output = Command::new("ffmpeg")
        .arg("-y")
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(&manifest_path)
        .args(["-c", "copy"])
        .arg(&output_path)
        .output()
        .map_err(AssembleError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        // Never expose a half-written combined file.
        let _ = std::fs::remove_file(&output_path);
        return Err(AssembleError::Concat { stderr });
    }

    info!(output = %output_path.display(), "Segments combined");
    Ok(output_path)
}

/// Trim the combined file to the configured start offset and re-encode into
/// the requested container.
pub fn trim_video(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    encoder: &EncoderConfig,
) -> Result<(), AssembleError> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ss", &encoder.trim_start])
        .args(["-c:v", "libx264"])
        .args(["-preset", &encoder.preset])
        .args(["-crf", &encoder.crf.to_string()])
        .args(["-c:a", "aac"]);

    if format == OutputFormat::Ts {
        cmd.args(["-f", "mpegts"]);
    }
    cmd.arg(output);

    debug!(
        input = %input.display(),
        output = %output.display(),
        %format,
        "Running ffmpeg trim/re-encode"
    );

    let result = cmd.output().map_err(AssembleError::Spawn)?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
        let _ = std::fs::remove_file(output);
        return Err(AssembleError::Trim { stderr });
    }

    info!(output = %output.display(), "Video trimmed and re-encoded");
    Ok(())
}
