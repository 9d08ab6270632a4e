//! Bounded per-job log: pending lines for the monitor plus the latest line.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::process::LineSink;

/// Oldest pending lines are dropped beyond this many (transcoder output is chatty).
const MAX_PENDING_LINES: usize = 512;

#[derive(Debug, Default)]
pub struct JobLog {
    inner: Mutex<LogInner>,
}

#[derive(Debug, Default)]
struct LogInner {
    pending: VecDeque<String>,
    last: Option<String>,
}

impl JobLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a line; blank lines are ignored.
    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        let mut inner = self.lock();
        if inner.pending.len() == MAX_PENDING_LINES {
            inner.pending.pop_front();
        }
        inner.pending.push_back(line.to_string());
        inner.last = Some(line.to_string());
    }

    /// Takes the oldest unread line without blocking on anything but the log lock.
    pub fn next_line(&self) -> Option<String> {
        self.lock().pending.pop_front()
    }

    pub fn last_line(&self) -> Option<String> {
        self.lock().last.clone()
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }
}

impl LineSink for JobLog {
    fn line(&self, text: &str) {
        self.push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_read_in_order_and_last_is_kept() {
        let log = JobLog::new();
        log.push("one");
        log.push("two\n");
        log.push("   ");
        assert_eq!(log.pending(), 2);
        assert_eq!(log.next_line().as_deref(), Some("one"));
        assert_eq!(log.next_line().as_deref(), Some("two"));
        assert_eq!(log.next_line(), None);
        assert_eq!(log.last_line().as_deref(), Some("two"));
    }

    #[test]
    fn pending_is_bounded() {
        let log = JobLog::new();
        for i in 0..(MAX_PENDING_LINES + 10) {
            log.push(format!("line {i}"));
        }
        assert_eq!(log.pending(), MAX_PENDING_LINES);
        assert_eq!(log.next_line().as_deref(), Some("line 10"));
    }
}
