#![allow(dead_code)]

pub mod fake_tools;

use std::time::{Duration, Instant};

use yt2mp3_core::job::{Job, JobState};

/// Polls until `job` reaches `state` or ten seconds pass.
pub fn wait_for_state(job: &Job, state: JobState) -> bool {
    wait_until(Duration::from_secs(10), || job.state() == state)
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
