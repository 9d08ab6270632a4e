//! Fixed-size worker pool executing job runs.
//!
//! Workers are plain OS threads pulling `(job, ticket)` pairs from a shared
//! channel. At most one execution per job is in flight because a job only
//! hands out a ticket from a submittable state; the pool keeps no per-job
//! bookkeeping of its own.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::JobError;
use crate::job::{Job, RunTicket};
use crate::pipeline::PipelineEnv;

type Task = (Arc<Job>, RunTicket);

/// max(1, logical CPUs − 1): one core stays free for the host and the monitor.
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

pub struct JobScheduler {
    size: usize,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Starts `size` workers (at least one) that run jobs against `env`.
    pub fn new(size: usize, env: PipelineEnv) -> io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));
        let env = Arc::new(env);
        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let rx = Arc::clone(&rx);
            let env = Arc::clone(&env);
            let handle = thread::Builder::new()
                .name(format!("yt2mp3-worker-{}", n))
                .spawn(move || worker_loop(n, &rx, &env))?;
            workers.push(handle);
        }
        tracing::debug!(workers = size, "worker pool started");
        Ok(Self {
            size,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Moves the job to Submitted and queues its run. Fails without touching
    /// the job when the pool is shut down.
    pub fn submit(&self, job: Arc<Job>) -> Result<RunTicket, JobError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = sender.as_ref().ok_or(JobError::PoolClosed)?;
        let ticket = job.submit()?;
        if tx.send((Arc::clone(&job), ticket)).is_err() {
            // Every worker is gone; stop the job so it is not left Submitted.
            job.stop();
            return Err(JobError::PoolClosed);
        }
        Ok(ticket)
    }

    /// Closes the queue. Does not wait: workers finish their current run
    /// (jobs should have been stopped first) and then exit. Queued runs whose
    /// jobs were stopped are skipped by the job itself.
    pub fn shutdown(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!("worker pool shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Shuts down and waits for every worker to exit.
    pub fn join(&self) {
        self.shutdown();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(n: usize, rx: &Mutex<Receiver<Task>>, env: &PipelineEnv) {
    loop {
        let task = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let (job, ticket) = match task {
            Ok(task) => task,
            Err(_) => break,
        };
        tracing::debug!(worker = n, job = job.id(), "picked up job");
        let state = job.run(ticket, env);
        tracing::debug!(worker = n, job = job.id(), %state, "run returned");
    }
    tracing::trace!(worker = n, "worker exiting");
}
