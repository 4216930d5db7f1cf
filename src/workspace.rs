//! Per-job filesystem scopes.
//!
//! Every job gets a fresh directory `<root>/job-<id>-XXXXXX` laid out as:
//!
//! ```text
//! job-<id>-XXXXXX/
//!   input/            staged input (`source.<ext>`)
//!   hop-1/ hop-2/ …   one output directory per route hop
//!   office-profile/   LibreOffice user installation for this job only
//!   home/             HOME for every engine process
//! ```
//!
//! The directory is owned by a [`tempfile::TempDir`], so it is removed when
//! the [`Workspace`] is dropped even if the job future is cancelled or
//! panics. [`WorkspaceManager::release`] is the explicit, logged path.

use crate::engine::office::{HOME_DIR, PROFILE_DIR};
use crate::error::ConvertError;
use crate::format::Format;
use crate::job::JobId;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const INPUT_DIR: &str = "input";
const STAGED_STEM: &str = "source";

/// Creates and removes job workspaces under one root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

/// An exclusive directory tree owned by one job.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    dir: TempDir,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Fresh, empty output directory for hop `index` (1-indexed). A retry of
    /// the same hop starts from an empty directory again.
    pub async fn hop_dir(&self, index: usize) -> Result<PathBuf, ConvertError> {
        let dir = self.path().join(format!("hop-{index}"));
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| ConvertError::workspace("clear hop directory", &dir, e))?;
        }
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| ConvertError::workspace("create hop directory", &dir, e))?;
        Ok(dir)
    }
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create an isolated directory tree for `job_id`.
    pub async fn acquire(&self, job_id: JobId) -> Result<Workspace, ConvertError> {
        let root = std::path::absolute(&self.root)
            .map_err(|e| ConvertError::workspace("resolve root", &self.root, e))?;
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ConvertError::workspace("create root", &root, e))?;

        let prefix = format!("job-{job_id}-");
        let blocking_root = root.clone();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .tempdir_in(&blocking_root)
        })
        .await
        .map_err(|e| ConvertError::workspace("create job directory", &root, io::Error::other(e)))?
        .map_err(|e| ConvertError::workspace("create job directory", &root, e))?;

        let workspace = Workspace { job_id, dir };
        for sub in [INPUT_DIR, PROFILE_DIR, HOME_DIR] {
            let p = workspace.path().join(sub);
            tokio::fs::create_dir(&p)
                .await
                .map_err(|e| ConvertError::workspace("create directory", &p, e))?;
        }
        debug!(job = %job_id, "Acquired workspace {}", workspace.path().display());
        Ok(workspace)
    }

    /// Write the input bytes into the workspace and return their path.
    ///
    /// The staged file is named after the detected format, never after the
    /// caller's file name, so engines never see user-controlled paths.
    pub async fn stage_input(
        &self,
        workspace: &Workspace,
        bytes: &[u8],
        format: Format,
    ) -> Result<PathBuf, ConvertError> {
        let path = workspace
            .path()
            .join(INPUT_DIR)
            .join(format!("{STAGED_STEM}.{}", format.extension()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ConvertError::workspace("stage input", &path, e))?;
        Ok(path)
    }

    /// Read an output file. Paths outside the workspace are refused.
    pub async fn collect_output(
        &self,
        workspace: &Workspace,
        path: &Path,
    ) -> Result<Vec<u8>, ConvertError> {
        if !path.starts_with(workspace.path()) {
            return Err(ConvertError::workspace(
                "collect output",
                path,
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "path is outside the job workspace",
                ),
            ));
        }
        tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::workspace("collect output", path, e))
    }

    /// Remove the workspace. Failures are logged, never returned: a cleanup
    /// problem must not replace the job's own result.
    pub async fn release(&self, workspace: Workspace) {
        let job_id = workspace.job_id;
        let path = workspace.path().to_path_buf();
        match tokio::task::spawn_blocking(move || workspace.dir.close()).await {
            Ok(Ok(())) => debug!(job = %job_id, "Released workspace {}", path.display()),
            Ok(Err(e)) => warn!(
                job = %job_id,
                "Failed to remove workspace {}: {}",
                path.display(),
                e
            ),
            Err(e) => warn!(job = %job_id, "Workspace cleanup task failed: {}", e),
        }
    }
}
