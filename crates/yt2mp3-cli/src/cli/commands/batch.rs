//! `yt2mp3 batch <jobs-file>` – interactive session over a list of jobs.
//!
//! Jobs run on the worker pool; the status monitor feeds the console
//! presenter; other invocations can start and stop jobs over the control
//! socket. The session ends once nothing is queued or running.

use anyhow::{bail, Result};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use yt2mp3_core::config::{self, AppConfig};
use yt2mp3_core::control::{self, JobControl};
use yt2mp3_core::job::JobState;
use yt2mp3_core::monitor::{MonitorEvent, StatusMonitor};
use yt2mp3_core::registry::JobRegistry;
use yt2mp3_core::scheduler::JobScheduler;
use yt2mp3_core::tools;

use crate::cli::control_socket;
use crate::cli::present::ConsolePresenter;

/// Monitor events buffered between the polling thread and the presenter.
const EVENT_BUFFER: usize = 1024;

pub async fn run_batch(cfg: &AppConfig, jobs_file: &Path, with_socket: bool) -> Result<ExitCode> {
    let file = config::load_jobs_file(jobs_file)?;
    if file.jobs.is_empty() {
        bail!("{} lists no [[job]] entries", jobs_file.display());
    }
    tools::check_requirements(&cfg.tools())?;

    let defaults = cfg.job_defaults();
    let registry = Arc::new(JobRegistry::with_defaults(defaults.clone()));
    for (index, spec) in file.jobs.into_iter().enumerate() {
        let job = registry.create(spec.into_config(&defaults));
        if !job.is_runnable() {
            println!("#{} is incomplete and will not run", index);
        }
    }

    let scheduler = JobScheduler::new(cfg.pool_size(), cfg.pipeline_env())?;
    tracing::info!(workers = scheduler.size(), jobs = registry.len(), "batch session starting");
    let job_control = Arc::new(JobControl::new(Arc::clone(&registry), scheduler));

    let mut socket = None;
    if with_socket {
        match control::default_control_socket_path() {
            Ok(path) => {
                match control_socket::spawn_control_listener(Arc::clone(&job_control), &path) {
                    Ok(handle) => {
                        tracing::debug!(path = %path.display(), "control socket listening");
                        socket = Some((path, handle));
                    }
                    Err(e) => tracing::warn!("control socket unavailable: {:#}", e),
                }
            }
            Err(e) => tracing::warn!("control socket path: {}", e),
        }
    }

    let submitted = job_control.run_all();
    println!("{} job(s) submitted", submitted);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<MonitorEvent>(EVENT_BUFFER);
    let monitor = StatusMonitor::spawn(Arc::clone(&registry), cfg.poll_interval(), event_tx)?;
    let mut presenter = ConsolePresenter::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;
    loop {
        tokio::select! {
            res = &mut ctrl_c, if !stopping => {
                if let Err(e) = res {
                    tracing::warn!("ctrl-c handler: {}", e);
                }
                stopping = true;
                println!("stopping all jobs...");
                job_control.stop_all();
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                presenter.handle(&event);
                if let MonitorEvent::Aggregate(agg) = &event {
                    if agg.stoppable == 0 {
                        break;
                    }
                }
            }
        }
    }

    monitor.stop();
    job_control.shutdown();
    if let Some((path, handle)) = socket {
        handle.abort();
        let _ = std::fs::remove_file(&path);
    }
    tokio::task::block_in_place(|| {
        job_control.join();
        monitor.join();
    });

    // Lines the monitor had no cycle left to deliver.
    for (index, job) in registry.all().iter().enumerate() {
        while let Some(line) = job.next_log_line() {
            println!("[#{}] {}", index, line);
        }
    }

    let agg = job_control.aggregate();
    println!(
        "done: {} finished, {} failed, {} stopped",
        agg.count(JobState::Finished),
        agg.count(JobState::Failed),
        agg.count(JobState::Stopped)
    );
    if agg.count(JobState::Failed) > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
