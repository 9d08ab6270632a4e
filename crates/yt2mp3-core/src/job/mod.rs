//! Jobs: one configuration, one lifecycle state, the processes of the current run.
//!
//! All state a worker, the monitor and the control thread share lives behind
//! one lock per job: state, run generation and tracked processes change
//! together, so a stop either happens before a run registers a process (and
//! the process is refused) or after (and the process is killed).

mod config;
mod log;
mod state;

pub use config::{
    path_with_audio_extension, with_audio_extension, JobConfig, Segmentation, AUDIO_EXTENSION,
    DEFAULT_SEGMENT_NAME,
};
pub use log::JobLog;
pub use state::JobState;

use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{JobError, PipelineError};
use crate::pipeline::{self, PipelineEnv, StageHost};
use crate::process::{ExitResult, LineSink, ProcessHandle, ProcessRunner, ProcessTracker};

/// Job identifier, unique within one registry.
pub type JobId = u64;

/// Proof of one accepted submission. A worker execution is bound to the
/// ticket it was submitted with; once the job is stopped or resubmitted the
/// ticket goes stale and the execution can no longer change the job's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
}

/// Point-in-time view of a job, as read by the status monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobObservation {
    pub id: JobId,
    pub state: JobState,
    pub runnable: bool,
    pub stoppable: bool,
    pub display_name: String,
}

#[derive(Debug)]
struct JobInner {
    config: JobConfig,
    state: JobState,
    generation: u64,
    processes: Vec<ProcessHandle>,
}

impl JobInner {
    fn is_current(&self, ticket: RunTicket) -> bool {
        self.generation == ticket.generation
    }
}

#[derive(Debug)]
pub struct Job {
    id: JobId,
    inner: Mutex<JobInner>,
    log: Arc<JobLog>,
}

impl Job {
    pub fn new(id: JobId, config: JobConfig) -> Self {
        Self {
            id,
            inner: Mutex::new(JobInner {
                config,
                state: JobState::Idle,
                generation: 0,
                processes: Vec::new(),
            }),
            log: Arc::new(JobLog::new()),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    fn lock(&self) -> Result<MutexGuard<'_, JobInner>, JobError> {
        self.inner.lock().map_err(|_| JobError::Poisoned(self.id))
    }

    /// Lock for paths that must make progress regardless (stop, run bookkeeping).
    fn lock_anyway(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> JobState {
        self.lock_anyway().state
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> JobConfig {
        self.lock_anyway().config.clone()
    }

    /// Applies `edit` to the configuration if the job is Idle, Stopped or Failed.
    pub fn edit<F: FnOnce(&mut JobConfig)>(&self, edit: F) -> Result<(), JobError> {
        let mut inner = self.lock()?;
        if !inner.state.is_editable() {
            return Err(JobError::NotEditable(self.id, inner.state));
        }
        edit(&mut inner.config);
        Ok(())
    }

    /// Complete configuration and a state that permits a fresh run.
    pub fn is_runnable(&self) -> bool {
        let inner = self.lock_anyway();
        inner.state.can_submit() && inner.config.is_complete()
    }

    pub fn is_stoppable(&self) -> bool {
        self.state().is_active()
    }

    /// Idle/Stopped/Failed → Submitted. Returns the ticket the worker must run with.
    pub fn submit(&self) -> Result<RunTicket, JobError> {
        let mut inner = self.lock()?;
        if !inner.state.can_submit() || !inner.config.is_complete() {
            return Err(JobError::NotRunnable(self.id));
        }
        inner.generation += 1;
        inner.state = JobState::Submitted;
        inner.processes.clear();
        tracing::debug!(job = self.id, generation = inner.generation, "submitted");
        Ok(RunTicket {
            generation: inner.generation,
        })
    }

    /// Stops an active job: state becomes Stopped and every tracked process is
    /// killed. Does not wait for the worker. Returns false (and changes
    /// nothing) if the job was not Submitted or Running.
    pub fn stop(&self) -> bool {
        let processes = {
            let mut inner = self.lock_anyway();
            if !inner.state.is_active() {
                return false;
            }
            inner.state = JobState::Stopped;
            for process in &inner.processes {
                process.terminate();
            }
            self.log.push("stopped");
            std::mem::take(&mut inner.processes)
        };
        tracing::info!(job = self.id, killed = processes.len(), "stopped");
        true
    }

    /// Worker entry point: runs the media pipeline for `ticket`.
    ///
    /// Returns immediately if the job was stopped (or resubmitted) between
    /// submission and pickup. On completion the outcome is recorded unless a
    /// stop got there first. Returns the state the job is in afterwards.
    pub fn run(&self, ticket: RunTicket, env: &PipelineEnv) -> JobState {
        let runner = ProcessRunner::new(env.process_poll_interval);
        self.execute(ticket, |config, host| {
            let ctx = RunContext {
                view: host,
                runner,
                sink: Arc::clone(&self.log) as Arc<dyn LineSink>,
            };
            pipeline::run(self.id, config, env, &ctx)
        })
    }

    /// Lifecycle bookkeeping around one pipeline invocation. `work` receives
    /// the configuration snapshot and a ticket-bound view of the job.
    pub(crate) fn execute<F>(&self, ticket: RunTicket, work: F) -> JobState
    where
        F: FnOnce(&JobConfig, &TicketView<'_>) -> Result<PathBuf, PipelineError>,
    {
        let config = {
            let mut inner = self.lock_anyway();
            if !inner.is_current(ticket) || inner.state != JobState::Submitted {
                tracing::debug!(job = self.id, state = %inner.state, "run skipped");
                return inner.state;
            }
            inner.state = JobState::Running;
            inner.config.clone()
        };
        tracing::info!(job = self.id, video = %config.video, "running");
        self.log.push(format!("started {}", config.video));

        let view = TicketView { job: self, ticket };
        let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&config, &view))) {
            Ok(result) => result,
            Err(payload) => Err(PipelineError::Internal(panic_message(payload.as_ref()))),
        };

        let (state, message) = {
            let mut inner = self.lock_anyway();
            if !inner.is_current(ticket) || inner.state != JobState::Running {
                return inner.state;
            }
            inner.processes.clear();
            let (state, message) = match result {
                Ok(dest) => (JobState::Finished, format!("finished: {}", dest.display())),
                Err(PipelineError::Stopped) => (JobState::Stopped, "stopped".to_string()),
                Err(e) => (JobState::Failed, format!("failed: {}", e)),
            };
            inner.state = state;
            // Logged under the lock so the line is there once the state is visible.
            self.log.push(message.as_str());
            (state, message)
        };
        match state {
            JobState::Failed => tracing::warn!(job = self.id, "{}", message),
            _ => tracing::info!(job = self.id, "{}", message),
        }
        state
    }

    /// Monitor view. Fails (instead of recovering) if the job lock is poisoned.
    pub fn observe(&self) -> Result<JobObservation, JobError> {
        let inner = self.lock()?;
        Ok(JobObservation {
            id: self.id,
            state: inner.state,
            runnable: inner.state.can_submit() && inner.config.is_complete(),
            stoppable: inner.state.is_active(),
            display_name: inner.config.display_name(),
        })
    }

    /// Next unread log line, if any. Never waits for the worker.
    pub fn next_log_line(&self) -> Option<String> {
        self.log.next_line()
    }

    pub fn last_log_line(&self) -> Option<String> {
        self.log.last_line()
    }

    /// Number of processes currently tracked for the active run.
    pub fn tracked_processes(&self) -> usize {
        self.lock_anyway().processes.len()
    }
}

/// A job as seen by one run: cancellation and process tracking are relative
/// to the run's ticket.
pub(crate) struct TicketView<'a> {
    job: &'a Job,
    ticket: RunTicket,
}

impl TicketView<'_> {
    pub fn cancelled(&self) -> bool {
        let inner = self.job.lock_anyway();
        !inner.is_current(self.ticket) || inner.state != JobState::Running
    }

    pub fn log(&self, line: &str) {
        self.job.log.push(line);
    }
}

impl ProcessTracker for TicketView<'_> {
    fn track(&self, handle: &ProcessHandle) -> bool {
        let mut inner = self.job.lock_anyway();
        if !inner.is_current(self.ticket) || inner.state != JobState::Running {
            return false;
        }
        inner.processes.push(handle.clone());
        true
    }

    fn untrack(&self, handle: &ProcessHandle) {
        let mut inner = self.job.lock_anyway();
        inner.processes.retain(|p| !p.same_process(handle));
    }
}

/// Stage host for a real run: tools are spawned as OS processes tracked by the job.
struct RunContext<'a> {
    view: &'a TicketView<'a>,
    runner: ProcessRunner,
    sink: Arc<dyn LineSink>,
}

impl StageHost for RunContext<'_> {
    fn run_tool(&self, argv: &[OsString]) -> Result<ExitResult, PipelineError> {
        tracing::debug!(
            job = self.view.job.id,
            generation = self.view.ticket.generation,
            program = ?argv.first(),
            "running tool"
        );
        self.runner.run(argv, self.view, Arc::clone(&self.sink))
    }

    fn cancelled(&self) -> bool {
        self.view.cancelled()
    }

    fn log(&self, line: &str) {
        self.view.log(line);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
