//! External process runner.
//!
//! Spawns a tool with an argument vector, registers the handle with its owner
//! before waiting, waits for exit and unregisters it again. A handle can be
//! terminated from any thread while another thread waits on it.

mod handle;
mod runner;

pub use handle::ProcessHandle;
pub use runner::{ProcessRunner, DEFAULT_POLL_INTERVAL};

/// How a tracked process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitResult {
    /// Exit code, or None if the process died from a signal.
    pub code: Option<i32>,
    /// The process was terminated through its handle.
    pub terminated: bool,
}

impl ExitResult {
    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.terminated
    }
}

/// Owner of tracked processes (a job's run).
pub trait ProcessTracker {
    /// Records a freshly spawned process. Returning false means the owner no
    /// longer accepts processes (it was stopped); the runner then terminates it.
    fn track(&self, handle: &ProcessHandle) -> bool;

    /// Forgets a process after it exited.
    fn untrack(&self, handle: &ProcessHandle);
}

/// Receives output lines of a running tool.
pub trait LineSink: Send + Sync {
    fn line(&self, text: &str);
}
