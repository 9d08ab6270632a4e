//! The two external tools and the check that they are installed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use which::which;

use crate::error::PipelineError;

/// Programs used by the pipeline: a video fetcher and a media transcoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub fetcher: PathBuf,
    pub transcoder: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            fetcher: PathBuf::from("yt-dlp"),
            transcoder: PathBuf::from("ffmpeg"),
        }
    }
}

/// Finds `program` the way a shell would: explicit paths are checked as-is,
/// bare names are searched on `PATH`.
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    which(program).ok()
}

/// Fails with a `Precondition` error naming every tool that cannot be found.
pub fn check_requirements(tools: &ToolPaths) -> Result<(), PipelineError> {
    let missing: Vec<String> = [&tools.fetcher, &tools.transcoder]
        .into_iter()
        .filter(|p| resolve_program(p).is_none())
        .map(|p| p.display().to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    tracing::warn!(?missing, "required tools not found");
    Err(PipelineError::Precondition {
        message: format!(
            "required executable(s) not found: {}. Install them (e.g. `apt install ffmpeg yt-dlp`) \
             or set `fetcher`/`transcoder` in config.toml",
            missing.join(", ")
        ),
    })
}
