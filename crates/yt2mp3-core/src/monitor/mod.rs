//! Status monitor: a dedicated thread that polls every job at a fixed
//! cadence and publishes log lines, aggregate counts and per-job status.
//!
//! Every cycle re-sends the full picture; consumers diff with `StatusView`.

mod view;

pub use view::StatusView;

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

use crate::job::{Job, JobId, JobObservation, JobState};
use crate::registry::JobRegistry;

pub const MIN_POLL_HZ: u32 = 20;
pub const MAX_POLL_HZ: u32 = 50;
pub const DEFAULT_POLL_HZ: u32 = MIN_POLL_HZ;

/// Per-state tally plus runnable/stoppable counts, recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateStatus {
    /// One entry per `JobState`, zero included.
    pub by_state: BTreeMap<JobState, usize>,
    pub runnable: usize,
    pub stoppable: usize,
}

impl Default for AggregateStatus {
    fn default() -> Self {
        Self {
            by_state: JobState::ALL.iter().map(|s| (*s, 0)).collect(),
            runnable: 0,
            stoppable: 0,
        }
    }
}

impl AggregateStatus {
    pub fn count(&self, state: JobState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_state.values().sum()
    }

    /// Counts one observed job.
    pub fn record(&mut self, obs: &JobObservation) {
        *self.by_state.entry(obs.state).or_insert(0) += 1;
        if obs.runnable {
            self.runnable += 1;
        }
        if obs.stoppable {
            self.stoppable += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// One pending log line of a job.
    Log { job: JobId, line: String },
    Aggregate(AggregateStatus),
    /// Current state and display name of the job at `index`.
    JobStatus {
        index: usize,
        job: JobId,
        state: JobState,
        name: String,
    },
}

/// Cycle length for a cadence in Hz, clamped to 20..=50.
pub fn interval_for_hz(hz: u32) -> Duration {
    let hz = hz.clamp(MIN_POLL_HZ, MAX_POLL_HZ);
    Duration::from_micros(1_000_000 / u64::from(hz))
}

/// Jobs that could be inspected this cycle, with their registry index.
struct Snapshot {
    jobs: Vec<(usize, Arc<Job>, JobObservation)>,
    aggregate: AggregateStatus,
}

/// A job that cannot be inspected is logged and left out; the others are
/// still reported.
fn snapshot(registry: &JobRegistry) -> Snapshot {
    let jobs = registry.all();
    let mut observed = Vec::with_capacity(jobs.len());
    let mut aggregate = AggregateStatus::default();
    for (index, job) in jobs.into_iter().enumerate() {
        match job.observe() {
            Ok(obs) => {
                aggregate.record(&obs);
                observed.push((index, job, obs));
            }
            Err(e) => tracing::warn!(job = job.id(), "status poll failed: {}", e),
        }
    }
    Snapshot {
        jobs: observed,
        aggregate,
    }
}

fn status_event(index: usize, obs: JobObservation) -> MonitorEvent {
    MonitorEvent::JobStatus {
        index,
        job: obs.id,
        state: obs.state,
        name: obs.display_name,
    }
}

/// One monitor cycle over a snapshot of the registry.
pub fn poll_once(registry: &JobRegistry) -> Vec<MonitorEvent> {
    let snap = snapshot(registry);
    let mut events = Vec::with_capacity(snap.jobs.len() * 2 + 1);
    for (index, job, obs) in snap.jobs {
        if let Some(line) = job.next_log_line() {
            events.push(MonitorEvent::Log { job: obs.id, line });
        }
        events.push(status_event(index, obs));
    }
    events.push(MonitorEvent::Aggregate(snap.aggregate));
    events
}

/// One cycle published straight into `tx`. A log line is only taken off its
/// job once a slot is reserved for it, so a full channel delays lines rather
/// than losing them. Status events are dropped when full; the next cycle
/// resends them. Returns `None` once the receiver is gone.
fn publish_once(registry: &JobRegistry, tx: &Sender<MonitorEvent>) -> Option<u64> {
    let snap = snapshot(registry);
    let mut dropped = 0u64;
    let mut send = |event: MonitorEvent| match tx.try_send(event) {
        Ok(()) => Some(()),
        Err(TrySendError::Full(_)) => {
            dropped += 1;
            Some(())
        }
        Err(TrySendError::Closed(_)) => None,
    };
    for (index, job, obs) in snap.jobs {
        match tx.try_reserve() {
            Ok(permit) => {
                if let Some(line) = job.next_log_line() {
                    permit.send(MonitorEvent::Log { job: obs.id, line });
                }
            }
            Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => return None,
        }
        send(status_event(index, obs))?;
    }
    send(MonitorEvent::Aggregate(snap.aggregate))?;
    Some(dropped)
}

/// Handle to the polling thread.
pub struct StatusMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    /// Starts polling `registry` every `interval`, sending events to `tx`.
    /// Status events are dropped while the channel is full, log lines wait;
    /// the loop ends when the receiver is gone or `stop` is called.
    pub fn spawn(
        registry: Arc<JobRegistry>,
        interval: Duration,
        tx: Sender<MonitorEvent>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("yt2mp3-monitor".to_string())
            .spawn(move || monitor_loop(&registry, interval, &tx, &flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Asks the loop to exit at the top of its next cycle. Does not wait.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("status monitor thread panicked");
            }
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(
    registry: &JobRegistry,
    interval: Duration,
    tx: &Sender<MonitorEvent>,
    stop: &AtomicBool,
) {
    tracing::debug!(interval_ms = interval.as_millis() as u64, "status monitor started");
    let mut dropped = 0u64;
    while !stop.load(Ordering::Relaxed) {
        match publish_once(registry, tx) {
            Some(n) => dropped += n,
            None => {
                tracing::debug!("status consumer gone, monitor exiting");
                return;
            }
        }
        thread::sleep(interval);
    }
    tracing::debug!(dropped, "status monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobConfig;
    use std::path::PathBuf;

    fn aggregate(events: &[MonitorEvent]) -> &AggregateStatus {
        events
            .iter()
            .find_map(|e| match e {
                MonitorEvent::Aggregate(a) => Some(a),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(interval_for_hz(20), Duration::from_millis(50));
        assert_eq!(interval_for_hz(50), Duration::from_millis(20));
        assert_eq!(interval_for_hz(1), Duration::from_millis(50));
        assert_eq!(interval_for_hz(1000), Duration::from_millis(20));
    }

    #[test]
    fn empty_registry_reports_zero_tally() {
        let events = poll_once(&JobRegistry::new());
        assert_eq!(events.len(), 1);
        let agg = aggregate(&events);
        assert_eq!(agg.by_state.len(), JobState::ALL.len());
        assert_eq!(agg.total(), 0);
    }

    #[test]
    fn tally_idle_running_failed() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::new("a", "a.mp3"));

        let running = reg.create(JobConfig::new("b", "b.mp3"));
        let ticket = running.submit().unwrap();
        let failed = reg.create(JobConfig::new("c", "c.mp3"));
        let failed_ticket = failed.submit().unwrap();
        failed.execute(failed_ticket, |_, _| {
            Err(crate::error::PipelineError::Fetch {
                video: "c".into(),
                reason: "download archive is empty".into(),
            })
        });

        running.execute(ticket, |_, _| {
            let events = poll_once(&reg);
            let agg = aggregate(&events);
            assert_eq!(agg.count(JobState::Idle), 1);
            assert_eq!(agg.count(JobState::Running), 1);
            assert_eq!(agg.count(JobState::Failed), 1);
            assert_eq!(agg.count(JobState::Submitted), 0);
            assert_eq!(agg.count(JobState::Finished), 0);
            assert_eq!(agg.count(JobState::Stopped), 0);
            // Failed is resubmittable too; only Idle and Failed are runnable.
            assert_eq!(agg.runnable, 2);
            assert_eq!(agg.stoppable, 1);
            Ok(PathBuf::from("b.mp3"))
        });
    }

    #[test]
    fn incomplete_idle_job_is_not_counted_runnable() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::default());
        let events = poll_once(&reg);
        let agg = aggregate(&events);
        assert_eq!(agg.count(JobState::Idle), 1);
        assert_eq!(agg.runnable, 0);
    }

    #[test]
    fn one_log_line_per_job_per_cycle() {
        let reg = JobRegistry::new();
        let job = reg.create(JobConfig::new("a", "a.mp3"));
        let ticket = job.submit().unwrap();
        job.execute(ticket, |_, view| {
            view.log("first");
            Ok(PathBuf::from("a.mp3"))
        });
        let logs = |events: Vec<MonitorEvent>| -> Vec<String> {
            events
                .into_iter()
                .filter_map(|e| match e {
                    MonitorEvent::Log { line, .. } => Some(line),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(logs(poll_once(&reg)), vec!["started a"]);
        assert_eq!(logs(poll_once(&reg)), vec!["first"]);
        assert_eq!(logs(poll_once(&reg)).len(), 1);
        assert!(logs(poll_once(&reg)).is_empty());
    }

    fn log_lines(rx: &mut tokio::sync::mpsc::Receiver<MonitorEvent>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let MonitorEvent::Log { line, .. } = event {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn full_channel_keeps_log_lines_queued() {
        let reg = JobRegistry::new();
        let job = reg.create(JobConfig::new("a", "a.mp3"));
        let ticket = job.submit().unwrap();
        job.execute(ticket, |_, view| {
            view.log("first");
            view.log("second");
            Ok(PathBuf::from("a.mp3"))
        });
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        // Nobody reads: the first cycle fills the only slot, later cycles
        // must not consume the remaining lines.
        for _ in 0..5 {
            assert_eq!(publish_once(&reg, &tx), Some(2));
        }
        assert_eq!(log_lines(&mut rx), vec!["started a"]);

        let mut seen = Vec::new();
        for _ in 0..10 {
            publish_once(&reg, &tx);
            seen.extend(log_lines(&mut rx));
        }
        assert_eq!(seen.len(), 3, "{:?}", seen);
        assert_eq!(seen[0], "first");
        assert_eq!(seen[1], "second");
        assert!(seen[2].starts_with("finished"), "{}", seen[2]);
    }

    #[test]
    fn publish_reports_closed_receiver() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::new("a", "a.mp3"));
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        assert_eq!(publish_once(&reg, &tx), None);
    }

    #[test]
    fn job_status_carries_index_and_name() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::new("a", "/music/a.mp3"));
        let events = poll_once(&reg);
        assert!(events.contains(&MonitorEvent::JobStatus {
            index: 0,
            job: 1,
            state: JobState::Idle,
            name: "a.mp3".to_string(),
        }));
    }

    #[test]
    fn spawned_monitor_publishes_and_stops() {
        let reg = Arc::new(JobRegistry::new());
        reg.create(JobConfig::new("a", "a.mp3"));
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let monitor = StatusMonitor::spawn(Arc::clone(&reg), interval_for_hz(50), tx).unwrap();
        let first = rx.blocking_recv().unwrap();
        assert!(matches!(first, MonitorEvent::JobStatus { index: 0, .. }));
        monitor.join();
    }

    #[test]
    fn monitor_exits_when_receiver_dropped() {
        let reg = Arc::new(JobRegistry::new());
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        let monitor = StatusMonitor::spawn(reg, interval_for_hz(20), tx).unwrap();
        monitor.join();
    }
}
