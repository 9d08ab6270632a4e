//! Ordered collection of jobs.
//!
//! Mutated by the control side only; the monitor reads snapshots, so
//! appends and removals never invalidate an iteration in progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::JobError;
use crate::job::{Job, JobConfig, JobId};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<Vec<Arc<Job>>>,
    next_id: AtomicU64,
    defaults: JobConfig,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose new jobs start from `defaults` unless seeded otherwise.
    pub fn with_defaults(defaults: JobConfig) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &JobConfig {
        &self.defaults
    }

    /// Appends a new Idle job with `config` and returns it.
    pub fn create(&self, config: JobConfig) -> Arc<Job> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Arc::new(Job::new(id, config));
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&job));
        tracing::debug!(job = id, "job created");
        job
    }

    /// Appends a new job seeded with a copy of the job at `selected`, or
    /// with the defaults when nothing (or nothing valid) is selected.
    pub fn create_like(&self, selected: Option<usize>) -> Arc<Job> {
        let config = selected
            .and_then(|index| self.get(index))
            .map(|job| job.config())
            .unwrap_or_else(|| self.defaults.clone());
        self.create(config)
    }

    pub fn get(&self, index: usize) -> Option<Arc<Job>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Position and handle of the job with `id`.
    pub fn find(&self, id: JobId) -> Option<(usize, Arc<Job>)> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .find(|(_, job)| job.id() == id)
            .map(|(index, job)| (index, Arc::clone(job)))
    }

    /// Stops the job at `index` (if active) and removes it. Later jobs
    /// shift down by one; removed jobs are never reused.
    pub fn remove(&self, index: usize) -> Result<Arc<Job>, JobError> {
        let job = {
            let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
            if index >= jobs.len() {
                return Err(JobError::UnknownJob(index));
            }
            jobs.remove(index)
        };
        job.stop();
        tracing::debug!(job = job.id(), "job removed");
        Ok(job)
    }

    /// Snapshot in insertion order.
    pub fn all(&self) -> Vec<Arc<Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;

    #[test]
    fn create_appends_idle_jobs_in_order() {
        let reg = JobRegistry::new();
        let a = reg.create(JobConfig::new("a", "a.mp3"));
        let b = reg.create(JobConfig::new("b", "b.mp3"));
        assert_ne!(a.id(), b.id());
        let all = reg.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), a.id());
        assert_eq!(all[1].id(), b.id());
        assert!(all.iter().all(|j| j.state() == JobState::Idle));
    }

    #[test]
    fn create_like_copies_selected_config() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::new("abc", "out").with_segments(30, "%03d"));
        let copy = reg.create_like(Some(0));
        assert_eq!(copy.config(), reg.get(0).unwrap().config());
        assert_eq!(copy.state(), JobState::Idle);
    }

    #[test]
    fn create_like_without_selection_uses_defaults() {
        let defaults = JobConfig {
            segment_name: "part-%02d".to_string(),
            ..JobConfig::default()
        };
        let reg = JobRegistry::with_defaults(defaults.clone());
        assert_eq!(reg.create_like(None).config(), defaults);
        assert_eq!(reg.create_like(Some(7)).config(), defaults);
    }

    #[test]
    fn remove_stops_active_job_and_shifts_positions() {
        let reg = JobRegistry::new();
        let a = reg.create(JobConfig::new("a", "a.mp3"));
        let b = reg.create(JobConfig::new("b", "b.mp3"));
        a.submit().unwrap();
        let removed = reg.remove(0).unwrap();
        assert_eq!(removed.id(), a.id());
        assert_eq!(removed.state(), JobState::Stopped);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(0).unwrap().id(), b.id());
        assert_eq!(reg.find(a.id()).map(|(i, _)| i), None);
        assert_eq!(reg.find(b.id()).map(|(i, _)| i), Some(0));
    }

    #[test]
    fn remove_out_of_range() {
        let reg = JobRegistry::new();
        assert_eq!(reg.remove(0).unwrap_err(), JobError::UnknownJob(0));
        assert!(reg.is_empty());
    }

    #[test]
    fn snapshot_survives_concurrent_removal() {
        let reg = JobRegistry::new();
        reg.create(JobConfig::new("a", "a.mp3"));
        reg.create(JobConfig::new("b", "b.mp3"));
        let snapshot = reg.all();
        reg.remove(0).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let reg = JobRegistry::new();
        let a = reg.create(JobConfig::new("a", "a.mp3"));
        reg.remove(0).unwrap();
        let b = reg.create(JobConfig::new("b", "b.mp3"));
        assert!(b.id() > a.id());
    }
}
