//! Per-run workspace allocation.
//!
//! Each run gets `<runs_root>/<uuid>/` with the video, audio, transcript and refined-transcript
//! directories inside. A run is only handed out once the whole tree exists; if any directory
//! fails, the partial tree is removed and the call fails.

use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::IngestError;
use crate::types::{RunMetadata, RunMode, UploadRun, Workspace};
use crate::utils::config::WorkspaceLayout;

#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    runs_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(runs_root: impl Into<PathBuf>) -> Self {
        WorkspaceManager {
            runs_root: runs_root.into(),
        }
    }

    pub fn runs_root(&self) -> &Path {
        &self.runs_root
    }

    /// Allocate a fresh id and its directory tree. The returned run is in `Created` state.
    pub fn create_run(&self, metadata: RunMetadata, mode: RunMode) -> Result<UploadRun, IngestError> {
        let runs_root = std::path::absolute(&self.runs_root)
            .map_err(|e| IngestError::filesystem(&self.runs_root, e))?;
        fs::create_dir_all(&runs_root).map_err(|e| IngestError::filesystem(&runs_root, e))?;

        let (id, root) = fresh_run_root(&runs_root)?;
        let workspace = Workspace::under(&root);
        allocate(&workspace)?;
        debug!("run {}: workspace ready at {}", id, root.display());
        Ok(UploadRun::new(id, workspace, metadata, mode))
    }
}

/// Draw ids until one names a directory that does not exist yet, then claim it.
fn fresh_run_root(runs_root: &Path) -> Result<(String, PathBuf), IngestError> {
    for _ in 0..WorkspaceLayout::MAX_ID_ATTEMPTS {
        let id = Uuid::new_v4().to_string();
        let root = runs_root.join(&id);
        match fs::create_dir(&root) {
            Ok(()) => return Ok((id, root)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!("run id {} already on disk; drawing another", id);
            }
            Err(e) => return Err(IngestError::filesystem(root, e)),
        }
    }
    Err(IngestError::filesystem(
        runs_root,
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not allocate a unique run directory",
        ),
    ))
}

/// Create every subdirectory or none. Recursive and idempotent for an existing tree.
pub fn allocate(workspace: &Workspace) -> Result<(), IngestError> {
    for dir in workspace.directories() {
        if let Err(e) = fs::create_dir_all(dir) {
            let _ = fs::remove_dir_all(&workspace.root);
            return Err(IngestError::filesystem(dir, e));
        }
    }
    Ok(())
}

/// Write the uploaded bytes into the run's video directory. Refuses to overwrite.
pub fn store_video(run: &UploadRun, file_name: &str, data: &[u8]) -> Result<PathBuf, IngestError> {
    let path = run.workspace.video_dir.join(file_name);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| IngestError::filesystem(&path, e))?;
    file.write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|e| IngestError::filesystem(&path, e))?;
    debug!("run {}: stored {} bytes at {}", run.id, data.len(), path.display());
    Ok(path)
}
