//! Fresh per-run temporary working directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::job::JobId;

/// Creates `root/job-<id>-<random>`, a directory no other run uses.
///
/// The directory is not removed on drop: cleanup deletes it only once it is
/// empty, so leftovers of a failed cleanup stay inspectable.
pub fn create_work_dir(root: &Path, job: JobId) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(root)
        .map_err(|e| PipelineError::io(format!("create work root {}", root.display()), e))?;
    let dir = tempfile::Builder::new()
        .prefix(&format!("job-{}-", job))
        .tempdir_in(root)
        .map_err(|e| PipelineError::io(format!("create work dir under {}", root.display()), e))?
        .keep();
    tracing::debug!(job, dir = %dir.display(), "created work dir");
    Ok(dir)
}
