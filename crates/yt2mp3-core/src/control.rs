//! Control surface for whatever presents jobs: add, remove, run, stop, edit.
//!
//! `JobControl` owns the registry and the worker pool. A control client
//! (e.g. `yt2mp3 stop 1` via socket) sends `ControlCommand`s that end up in
//! `apply`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::JobError;
use crate::job::{Job, JobConfig};
use crate::monitor::AggregateStatus;
use crate::registry::JobRegistry;
use crate::scheduler::JobScheduler;

/// A request a control client can send to a running session.
/// Indexes are zero-based positions in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Run(usize),
    Stop(usize),
    RunAll,
    StopAll,
}

impl ControlCommand {
    /// Wire form: `run <i>`, `stop <i>`, `run-all`, `stop-all`.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Run(i) => write!(f, "run {}", i),
            ControlCommand::Stop(i) => write!(f, "stop {}", i),
            ControlCommand::RunAll => write!(f, "run-all"),
            ControlCommand::StopAll => write!(f, "stop-all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown control command: {:?}", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let err = || ParseCommandError(line.trim().to_string());
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(err)?;
        let index = parts.next().map(|s| s.parse::<usize>().map_err(|_| err())).transpose()?;
        if parts.next().is_some() {
            return Err(err());
        }
        match (verb, index) {
            ("run", Some(i)) => Ok(ControlCommand::Run(i)),
            ("stop", Some(i)) => Ok(ControlCommand::Stop(i)),
            ("run-all", None) => Ok(ControlCommand::RunAll),
            ("stop-all", None) => Ok(ControlCommand::StopAll),
            _ => Err(err()),
        }
    }
}

/// Registry plus worker pool, with the operations a presentation layer needs.
pub struct JobControl {
    registry: Arc<JobRegistry>,
    scheduler: JobScheduler,
}

impl JobControl {
    pub fn new(registry: Arc<JobRegistry>, scheduler: JobScheduler) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Adds a job seeded from the job at `selected`, or from the defaults.
    pub fn add(&self, selected: Option<usize>) -> Arc<Job> {
        self.registry.create_like(selected)
    }

    /// Adds a job with an explicit configuration.
    pub fn add_config(&self, config: JobConfig) -> Arc<Job> {
        self.registry.create(config)
    }

    /// Stops (if active) and removes the job at `index`.
    pub fn remove(&self, index: usize) -> Result<(), JobError> {
        self.registry.remove(index).map(|_| ())
    }

    fn job(&self, index: usize) -> Result<Arc<Job>, JobError> {
        self.registry.get(index).ok_or(JobError::UnknownJob(index))
    }

    pub fn run(&self, index: usize) -> Result<(), JobError> {
        let job = self.job(index)?;
        self.scheduler.submit(job)?;
        Ok(())
    }

    /// Stops the job at `index`. Returns whether it was active. Never waits
    /// for the worker.
    pub fn stop(&self, index: usize) -> Result<bool, JobError> {
        Ok(self.job(index)?.stop())
    }

    /// Submits every runnable job; returns how many were submitted.
    pub fn run_all(&self) -> usize {
        let mut submitted = 0;
        for job in self.registry.all() {
            if !job.is_runnable() {
                continue;
            }
            match self.scheduler.submit(job) {
                Ok(_) => submitted += 1,
                Err(JobError::PoolClosed) => break,
                // Raced with another submit or an edit; skip it.
                Err(e) => tracing::debug!("run-all skipped a job: {}", e),
            }
        }
        submitted
    }

    /// Stops every stoppable job; returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        self.registry.all().iter().filter(|job| job.stop()).count()
    }

    pub fn edit<F: FnOnce(&mut JobConfig)>(&self, index: usize, edit: F) -> Result<(), JobError> {
        self.job(index)?.edit(edit)
    }

    /// Aggregate status as of now (one monitor cycle, log lines left unread).
    pub fn aggregate(&self) -> AggregateStatus {
        let mut aggregate = AggregateStatus::default();
        for job in self.registry.all() {
            if let Ok(obs) = job.observe() {
                aggregate.record(&obs);
            }
        }
        aggregate
    }

    pub fn next_log_line(&self, index: usize) -> Result<Option<String>, JobError> {
        Ok(self.job(index)?.next_log_line())
    }

    /// Teardown: stop every job, then close the pool without waiting for
    /// in-flight runs.
    pub fn shutdown(&self) {
        let stopped = self.stop_all();
        self.scheduler.shutdown();
        tracing::info!(stopped, "job control shut down");
    }

    /// Waits for workers to exit. Call after `shutdown` when the process
    /// is about to end anyway.
    pub fn join(&self) {
        self.scheduler.join();
    }

    /// Executes one control-socket command and returns a reply line.
    pub fn apply(&self, command: ControlCommand) -> String {
        let result = match command {
            ControlCommand::Run(i) => self.run(i).map(|_| format!("job {} submitted", i)),
            ControlCommand::Stop(i) => self.stop(i).map(|was_active| {
                if was_active {
                    format!("job {} stopped", i)
                } else {
                    format!("job {} was not active", i)
                }
            }),
            ControlCommand::RunAll => Ok(format!("{} job(s) submitted", self.run_all())),
            ControlCommand::StopAll => Ok(format!("{} job(s) stopped", self.stop_all())),
        };
        match result {
            Ok(reply) => reply,
            Err(e) => format!("error: {}", e),
        }
    }
}

/// Default path for the control socket (XDG state dir, next to the log).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("yt2mp3")?.get_state_home();
    Ok(dir.join("control.sock"))
}
