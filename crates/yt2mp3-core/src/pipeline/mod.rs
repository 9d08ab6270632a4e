//! Media pipeline: fetch → transcode → place (move or split) → cleanup.
//!
//! Synchronous and unaware of threads. Every tool invocation goes through a
//! `StageHost`, which is how the owning job tracks processes and signals
//! cancellation. Cleanup runs after every attempt, whichever stage failed.

mod cleanup;
mod fetch;
mod output;
mod transcode;
mod workdir;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;
use crate::job::{JobConfig, JobId};
use crate::process::{ExitResult, DEFAULT_POLL_INTERVAL};
use crate::tools::ToolPaths;

pub use output::Placement;
pub use workdir::create_work_dir;

/// Transcoder `-q:a` value used when none is configured (VBR, ~190 kbit/s).
pub const DEFAULT_AUDIO_QUALITY: u8 = 2;

/// Everything a run needs besides the job's own configuration.
#[derive(Debug, Clone)]
pub struct PipelineEnv {
    pub tools: ToolPaths,
    /// Parent of the per-run temporary working directories.
    pub work_root: PathBuf,
    pub audio_quality: u8,
    /// How often a running tool is checked for exit.
    pub process_poll_interval: Duration,
}

impl PipelineEnv {
    pub fn new(tools: ToolPaths, work_root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            work_root: work_root.into(),
            audio_quality: DEFAULT_AUDIO_QUALITY,
            process_poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Hook through which the pipeline runs tools and learns about stop requests.
pub trait StageHost {
    /// Runs a tool to completion (blocking) and reports how it ended.
    fn run_tool(&self, argv: &[OsString]) -> Result<ExitResult, PipelineError>;

    /// True once the owning run was stopped.
    fn cancelled(&self) -> bool;

    /// Appends a line to the job's user-visible log.
    fn log(&self, line: &str);
}

/// Files a run creates inside its working directory; cleanup removes them.
#[derive(Debug, Default)]
pub(crate) struct Artifacts {
    pub work_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub media: Option<PathBuf>,
    pub temp_audio: Option<PathBuf>,
    pub audio: Option<PathBuf>,
}

/// Runs all stages for `config`, then cleans up. Returns the output
/// destination (file or directory) on success.
pub fn run(
    job: JobId,
    config: &JobConfig,
    env: &PipelineEnv,
    host: &dyn StageHost,
) -> Result<PathBuf, PipelineError> {
    let mut artifacts = Artifacts::default();
    let result = run_stages(job, config, env, host, &mut artifacts);
    cleanup::remove_artifacts(&artifacts, host);
    match &result {
        Ok(dest) => tracing::info!(job, dest = %dest.display(), "pipeline finished"),
        Err(PipelineError::Stopped) => tracing::info!(job, "pipeline stopped"),
        Err(e) => tracing::warn!(job, "pipeline failed: {}", e),
    }
    result
}

fn run_stages(
    job: JobId,
    config: &JobConfig,
    env: &PipelineEnv,
    host: &dyn StageHost,
    artifacts: &mut Artifacts,
) -> Result<PathBuf, PipelineError> {
    ensure_not_cancelled(host)?;
    let work_dir = create_work_dir(&env.work_root, job)?;
    artifacts.work_dir = Some(work_dir.clone());

    let media = fetch::fetch(&config.video, &work_dir, env, host, artifacts)?;
    ensure_not_cancelled(host)?;

    let audio = transcode::convert(&media, env, host, artifacts)?;
    ensure_not_cancelled(host)?;

    let placement = Placement::decide(config)?;
    output::place(&placement, &audio, env, host)
}

fn ensure_not_cancelled(host: &dyn StageHost) -> Result<(), PipelineError> {
    if host.cancelled() {
        return Err(PipelineError::Stopped);
    }
    Ok(())
}

/// Runs one tool and turns a stop that happened meanwhile into `Stopped`.
pub(crate) fn run_stage_tool(
    host: &dyn StageHost,
    stage: &'static str,
    argv: Vec<OsString>,
) -> Result<ExitResult, PipelineError> {
    let res = host.run_tool(&argv)?;
    if res.terminated || host.cancelled() {
        tracing::debug!(stage, "tool ended by stop request");
        return Err(PipelineError::Stopped);
    }
    if !res.success() {
        tracing::debug!(stage, code = ?res.code, "tool exited with failure status");
    }
    Ok(res)
}

pub(crate) fn os(path: &Path) -> OsString {
    path.as_os_str().to_owned()
}

#[cfg(test)]
pub(crate) mod testing;
