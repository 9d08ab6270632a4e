//! Consumer-side diffing of monitor events.

use std::collections::HashMap;

use super::{AggregateStatus, MonitorEvent};
use crate::job::{JobId, JobState};

/// Last seen aggregate and per-job status. `apply` tells a presenter whether
/// an event changes anything worth rendering.
#[derive(Debug, Default)]
pub struct StatusView {
    aggregate: Option<AggregateStatus>,
    jobs: HashMap<JobId, (usize, JobState, String)>,
}

impl StatusView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` and returns true if it differs from what was seen
    /// before. Log lines are always new.
    pub fn apply(&mut self, event: &MonitorEvent) -> bool {
        match event {
            MonitorEvent::Log { .. } => true,
            MonitorEvent::Aggregate(agg) => {
                if self.aggregate.as_ref() == Some(agg) {
                    return false;
                }
                self.aggregate = Some(agg.clone());
                true
            }
            MonitorEvent::JobStatus {
                index,
                job,
                state,
                name,
            } => {
                let entry = (*index, *state, name.clone());
                if self.jobs.get(job) == Some(&entry) {
                    return false;
                }
                self.jobs.insert(*job, entry);
                true
            }
        }
    }

    pub fn aggregate(&self) -> Option<&AggregateStatus> {
        self.aggregate.as_ref()
    }

    pub fn state_of(&self, job: JobId) -> Option<JobState> {
        self.jobs.get(&job).map(|(_, state, _)| *state)
    }
}
