//! Console presentation of monitor events for the batch session.

use std::collections::HashMap;
use yt2mp3_core::job::{JobId, JobState};
use yt2mp3_core::monitor::{AggregateStatus, MonitorEvent, StatusView};

/// Prints monitor events, skipping the ones that change nothing.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    view: StatusView,
    names: HashMap<JobId, String>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line to print for `event`, or None when it repeats what was shown.
    pub fn render(&mut self, event: &MonitorEvent) -> Option<String> {
        if !self.view.apply(event) {
            return None;
        }
        match event {
            MonitorEvent::Log { job, line } => Some(format!("[{}] {}", self.label(*job), line)),
            MonitorEvent::JobStatus {
                index,
                job,
                state,
                name,
            } => {
                self.names.insert(*job, name.clone());
                Some(format_status(*index, name, *state))
            }
            MonitorEvent::Aggregate(agg) => Some(format_aggregate(agg)),
        }
    }

    pub fn handle(&mut self, event: &MonitorEvent) {
        if let Some(line) = self.render(event) {
            println!("{}", line);
        }
    }

    fn label(&self, job: JobId) -> String {
        match self.names.get(&job) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("job {}", job),
        }
    }
}

pub fn format_status(index: usize, name: &str, state: JobState) -> String {
    let name = if name.is_empty() { "(no output)" } else { name };
    format!("#{} {}: {}", index, name, state)
}

pub fn format_aggregate(agg: &AggregateStatus) -> String {
    let tally: Vec<String> = agg
        .by_state
        .iter()
        .map(|(state, n)| format!("{} {}", state, n))
        .collect();
    format!(
        "{} | runnable {}, stoppable {}",
        tally.join(", "),
        agg.runnable,
        agg.stoppable
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_events_render_once() {
        let mut p = ConsolePresenter::new();
        let status = MonitorEvent::JobStatus {
            index: 0,
            job: 1,
            state: JobState::Running,
            name: "out.mp3".into(),
        };
        assert!(p.render(&status).is_some());
        assert!(p.render(&status).is_none());
        let agg = MonitorEvent::Aggregate(AggregateStatus::default());
        assert!(p.render(&agg).is_some());
        assert!(p.render(&agg).is_none());
    }

    #[test]
    fn log_lines_use_job_name() {
        let mut p = ConsolePresenter::new();
        let log = MonitorEvent::Log {
            job: 1,
            line: "converting".into(),
        };
        assert_eq!(p.render(&log).unwrap(), "[job 1] converting");
        p.render(&MonitorEvent::JobStatus {
            index: 0,
            job: 1,
            state: JobState::Running,
            name: "out.mp3".into(),
        });
        assert_eq!(p.render(&log).unwrap(), "[out.mp3] converting");
    }

    #[test]
    fn aggregate_line_lists_every_state() {
        let mut agg = AggregateStatus::default();
        agg.by_state.insert(JobState::Idle, 1);
        agg.by_state.insert(JobState::Running, 1);
        agg.by_state.insert(JobState::Failed, 1);
        agg.runnable = 2;
        agg.stoppable = 1;
        let line = format_aggregate(&agg);
        for state in JobState::ALL {
            assert!(line.contains(state.as_str()), "{line}");
        }
        assert!(line.contains("running 1"), "{line}");
        assert!(line.ends_with("| runnable 2, stoppable 1"), "{line}");
    }

    #[test]
    fn status_line() {
        assert_eq!(format_status(2, "a.mp3", JobState::Failed), "#2 a.mp3: failed");
        assert_eq!(format_status(0, "", JobState::Idle), "#0 (no output): idle");
    }
}
