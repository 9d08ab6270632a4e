//! Shared handle to a spawned child process.

use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Inner {
    pid: u32,
    child: Mutex<Child>,
    terminated: AtomicBool,
}

/// Cloneable reference to a child process. The waiting thread polls it with
/// `try_wait`; any other thread may `terminate` it at the same time.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

impl ProcessHandle {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            inner: Arc::new(Inner {
                pid: child.id(),
                child: Mutex::new(child),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// True once `terminate` was called on this handle or one of its clones.
    pub fn was_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same process.
    pub fn same_process(&self, other: &ProcessHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn child(&self) -> MutexGuard<'_, Child> {
        self.inner.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        self.child().try_wait()
    }

    /// Sends a kill signal and returns without waiting for the exit.
    ///
    /// On Unix the whole process group is signalled so helpers spawned by the
    /// tool go down with it. A process that already exited is left alone.
    pub fn terminate(&self) {
        self.inner.terminated.store(true, Ordering::Release);
        let mut child = self.child();
        // Not reaped yet means the pid (and group id) still belongs to our child.
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(-(self.inner.pid as libc::pid_t), libc::SIGKILL) };
            if rc == 0 {
                tracing::debug!(pid = self.inner.pid, "killed process group");
                return;
            }
        }
        if let Err(e) = child.kill() {
            tracing::debug!(pid = self.inner.pid, "kill failed: {}", e);
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.inner.pid)
            .field("terminated", &self.was_terminated())
            .finish()
    }
}
