//! Job lifecycle states.

use std::fmt;

/// Where a job is in its lifecycle.
///
/// `Idle → Submitted → Running → {Finished | Stopped | Failed}`. Stopped and
/// Failed jobs may be edited and submitted again; Finished is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobState {
    Idle,
    Submitted,
    Running,
    Finished,
    Stopped,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::Idle,
        JobState::Submitted,
        JobState::Running,
        JobState::Finished,
        JobState::Stopped,
        JobState::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Finished => "finished",
            JobState::Stopped => "stopped",
            JobState::Failed => "failed",
        }
    }

    /// Configuration may only change in these states.
    pub fn is_editable(self) -> bool {
        matches!(self, JobState::Idle | JobState::Stopped | JobState::Failed)
    }

    /// States from which a fresh run may be submitted.
    pub fn can_submit(self) -> bool {
        self.is_editable()
    }

    /// Submitted or Running: there is something a stop request can act on.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Submitted | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
