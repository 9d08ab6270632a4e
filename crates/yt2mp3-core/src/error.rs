//! Error types for pipeline runs and job control.
//!
//! `PipelineError` is what a single run of the fetch/transcode/place sequence
//! can fail with; it is caught at the job boundary and turned into a state.
//! `JobError` is returned to whoever drives jobs (CLI, control socket).

use std::path::PathBuf;
use thiserror::Error;

use crate::job::{JobId, JobState};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required external tool is missing or could not be started.
    #[error("{message}")]
    Precondition { message: String },

    /// The fetcher left no download archive, an empty one, or no media file.
    #[error("fetch failed for \"{video}\": {reason}")]
    Fetch { video: String, reason: String },

    /// The transcoder did not produce the intermediate audio file.
    #[error("transcode failed: {} was not produced", .path.display())]
    Transcode { path: PathBuf },

    /// Segment mode produced no output files.
    #[error("no audio segments were produced in {}", .dir.display())]
    Segmentation { dir: PathBuf },

    /// The run was cancelled by a stop request. Not a failure.
    #[error("stopped by user")]
    Stopped,

    #[error("{context}: {source}")]
    Unexpected {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A stage panicked; the message is whatever the panic payload carried.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Unexpected {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {0} is not runnable")]
    NotRunnable(JobId),

    #[error("job {0} cannot be edited while {1}")]
    NotEditable(JobId, JobState),

    #[error("job {0} is unavailable (a worker panicked while holding it)")]
    Poisoned(JobId),

    #[error("no job at position {0}")]
    UnknownJob(usize),

    #[error("worker pool is shut down")]
    PoolClosed,
}
