//! Per-post workspace lifecycle.
//!
//! Every download job owns one subdirectory of the storage root, named after
//! the post id, holding its segments, concat manifest, combined file and
//! final deliverable. Idle workspaces are reclaimed wholesale by a periodic
//! reaper once their modification time exceeds the TTL.
//!
//! The reaper is not coordinated with in-flight jobs: a job that outlives
//! the TTL can lose its workspace mid-run. That trades strict correctness
//! under long jobs for bounded storage growth; a reaped post id is simply a
//! fresh job on its next request.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;

/// Error type for workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The job id would escape the storage root.
    #[error("invalid job id: {0:?}")]
    InvalidJobId(String),

    /// Directory creation failed.
    #[error("failed to create workspace: {0}")]
    Io(#[from] std::io::Error),
}

/// A job's working directory, created and owned for one download.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The storage root plus reclamation policy.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
    ttl: Duration,
}

impl WorkspaceRoot {
    pub fn new(root: PathBuf, ttl: Duration) -> Self {
        Self { root, ttl }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), Duration::from_secs(config.ttl_secs))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Idempotently create the storage root and the job's subdirectory.
    ///
    /// Safe to call repeatedly for the same id and concurrently for
    /// different ids; an already-existing directory is not an error.
    pub fn ensure(&self, post_id: &str) -> Result<Workspace, WorkspaceError> {
        if post_id.is_empty()
            || post_id == "."
            || post_id == ".."
            || post_id.contains(['/', '\\'])
        {
            return Err(WorkspaceError::InvalidJobId(post_id.to_string()));
        }

        let dir = self.root.join(post_id);
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Workspace ready");
        Ok(Workspace { dir })
    }

    /// Delete every job directory whose mtime is older than the TTL.
    ///
    /// Idempotent: a directory already gone (or a root that does not exist
    /// yet) is not an error. Returns the number of directories removed.
    pub fn reap_expired(&self) -> usize {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Failed to read storage root {:?}: {}", self.root, e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .is_some_and(|idle| idle > self.ttl);

            if expired {
                match std::fs::remove_dir_all(&path) {
                    Ok(()) => {
                        info!(dir = %path.display(), "Reaped expired workspace");
                        removed += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to reap workspace {:?}: {}", path, e),
                }
            }
        }

        if removed > 0 {
            debug!(removed, "Workspace reap pass complete");
        }
        removed
    }
}

/// Start the background reaper.
///
/// Started exactly once at process init; runs forever on a fixed interval
/// and shares no lock with request handling.
pub fn start_reaper(root: WorkspaceRoot, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh start does
        // not race jobs created moments before a restart.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            root.reap_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_with_ttl(ttl: Duration) -> (tempfile::TempDir, WorkspaceRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path().join("videos"), ttl);
        (dir, root)
    }

    #[test]
    fn test_ensure_creates_and_is_idempotent() {
        let (_guard, root) = root_with_ttl(Duration::from_secs(60));

        let ws = root.ensure("post123").unwrap();
        assert!(ws.dir().is_dir());

        // Second call succeeds and points at the same directory.
        let again = root.ensure("post123").unwrap();
        assert_eq!(ws.dir(), again.dir());
    }

    #[test]
    fn test_ensure_rejects_escaping_ids() {
        let (_guard, root) = root_with_ttl(Duration::from_secs(60));
        for id in ["", ".", "..", "a/b", "a\\b"] {
            let err = root.ensure(id).unwrap_err();
            assert!(matches!(err, WorkspaceError::InvalidJobId(_)), "id {id:?}");
        }
    }

    #[test]
    fn test_reap_removes_expired_directories() {
        let (_guard, root) = root_with_ttl(Duration::ZERO);
        root.ensure("old-post").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(root.reap_expired(), 1);
        assert!(!root.root().join("old-post").exists());
    }

    #[test]
    fn test_reap_keeps_fresh_directories() {
        let (_guard, root) = root_with_ttl(Duration::from_secs(3600));
        root.ensure("fresh-post").unwrap();

        assert_eq!(root.reap_expired(), 0);
        assert!(root.root().join("fresh-post").exists());
    }

    #[test]
    fn test_reap_is_idempotent() {
        let (_guard, root) = root_with_ttl(Duration::ZERO);
        root.ensure("old-post").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(root.reap_expired(), 1);
        // Second pass with the directory already gone must not error.
        assert_eq!(root.reap_expired(), 0);
    }

    #[test]
    fn test_reap_missing_root_is_not_an_error() {
        let (_guard, root) = root_with_ttl(Duration::ZERO);
        assert_eq!(root.reap_expired(), 0);
    }

    #[test]
    fn test_reap_ignores_plain_files() {
        let (_guard, root) = root_with_ttl(Duration::ZERO);
        root.ensure("post").unwrap();
        std::fs::write(root.root().join("stray.txt"), b"x").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(root.reap_expired(), 1);
        assert!(root.root().join("stray.txt").exists());
    }

    #[tokio::test]
    async fn test_reaper_task() {
        let (_guard, root) = root_with_ttl(Duration::ZERO);
        root.ensure("post").unwrap();

        let handle = start_reaper(root.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!root.root().join("post").exists());
        handle.abort();
    }
}
