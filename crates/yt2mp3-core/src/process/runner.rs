//! Spawn, track, wait, untrack.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PipelineError;

use super::{ExitResult, LineSink, ProcessHandle, ProcessTracker};

/// How often a waiting worker checks whether its child exited.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProcessRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Runs `argv` to completion. The handle is registered with `tracker`
    /// before waiting and unregistered after exit. Output lines (stdout and
    /// stderr) go to `sink`.
    ///
    /// Blocks the calling thread for the lifetime of the process.
    pub fn run(
        &self,
        argv: &[OsString],
        tracker: &dyn ProcessTracker,
        sink: Arc<dyn LineSink>,
    ) -> Result<ExitResult, PipelineError> {
        let (program, args) = argv.split_first().ok_or_else(|| PipelineError::Precondition {
            message: "empty command line".to_string(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(?argv, "spawning tool");
        let mut child = cmd.spawn().map_err(|e| PipelineError::Precondition {
            message: format!("could not start {}: {}", program.to_string_lossy(), e),
        })?;

        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(forward_lines(out, Arc::clone(&sink)));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(forward_lines(err, Arc::clone(&sink)));
        }

        let handle = ProcessHandle::new(child);
        if !tracker.track(&handle) {
            tracing::debug!(pid = handle.pid(), "owner refused process, terminating");
            handle.terminate();
        }

        let status = loop {
            match handle.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => break Err(e),
            }
        };
        tracker.untrack(&handle);
        let status = status.map_err(|e| {
            PipelineError::io(format!("wait for {}", program.to_string_lossy()), e)
        })?;

        let terminated = handle.was_terminated();
        // Helpers of a killed tool may keep the pipes open; only join readers
        // of processes that exited on their own.
        if !terminated {
            for reader in readers {
                let _ = reader.join();
            }
        }

        let result = ExitResult {
            code: status.code(),
            terminated,
        };
        tracing::debug!(pid = handle.pid(), code = ?result.code, terminated, "tool exited");
        Ok(result)
    }
}

/// Forwards every line of `reader` to `sink`. Carriage-return progress updates
/// within one line are collapsed to the latest one.
fn forward_lines<R: Read + Send + 'static>(reader: R, sink: Arc<dyn LineSink>) -> JoinHandle<()> {
    thread::spawn(move || {
        for chunk in BufReader::new(reader).split(b'\n') {
            let Ok(chunk) = chunk else { break };
            let text = String::from_utf8_lossy(&chunk);
            if let Some(latest) = text.split('\r').map(str::trim_end).filter(|s| !s.is_empty()).last() {
                sink.line(latest);
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl LineSink for Lines {
        fn line(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[derive(Default)]
    struct Tracker {
        refuse: bool,
        tracked: Mutex<Vec<ProcessHandle>>,
        untracked: Mutex<usize>,
    }

    impl ProcessTracker for Tracker {
        fn track(&self, handle: &ProcessHandle) -> bool {
            self.tracked.lock().unwrap().push(handle.clone());
            !self.refuse
        }

        fn untrack(&self, _handle: &ProcessHandle) {
            *self.untracked.lock().unwrap() += 1;
        }
    }

    fn argv(parts: &[&str]) -> Vec<OsString> {
        parts.iter().map(OsString::from).collect()
    }

    #[test]
    fn runs_and_forwards_output() {
        let lines = Arc::new(Lines::default());
        let tracker = Tracker::default();
        let res = ProcessRunner::default()
            .run(
                &argv(&["/bin/sh", "-c", "echo hello; printf 'a\\rb\\n' 1>&2; exit 3"]),
                &tracker,
                lines.clone(),
            )
            .unwrap();
        assert_eq!(res.code, Some(3));
        assert!(!res.terminated);
        assert_eq!(tracker.tracked.lock().unwrap().len(), 1);
        assert_eq!(*tracker.untracked.lock().unwrap(), 1);
        let mut got = lines.0.lock().unwrap().clone();
        got.sort();
        assert_eq!(got, vec!["b".to_string(), "hello".to_string()]);
    }

    #[test]
    fn refused_process_is_terminated() {
        let tracker = Tracker {
            refuse: true,
            ..Tracker::default()
        };
        let start = Instant::now();
        let res = ProcessRunner::default()
            .run(&argv(&["/bin/sh", "-c", "sleep 30"]), &tracker, Arc::new(Lines::default()))
            .unwrap();
        assert!(res.terminated);
        assert!(!res.success());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn terminate_from_another_thread_unblocks_wait() {
        let tracker = Arc::new(Tracker::default());
        let t = Arc::clone(&tracker);
        let killer = thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                if let Some(h) = t.tracked.lock().unwrap().first() {
                    h.terminate();
                    return;
                }
                assert!(Instant::now() < deadline, "process never tracked");
                thread::sleep(Duration::from_millis(10));
            }
        });
        let start = Instant::now();
        let res = ProcessRunner::default()
            .run(&argv(&["/bin/sh", "-c", "sleep 30"]), tracker.as_ref(), Arc::new(Lines::default()))
            .unwrap();
        killer.join().unwrap();
        assert!(res.terminated);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_program_is_precondition_error() {
        let err = ProcessRunner::default()
            .run(
                &argv(&["/nonexistent/yt2mp3-tool"]),
                &Tracker::default(),
                Arc::new(Lines::default()),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Precondition { .. }));
    }
}
