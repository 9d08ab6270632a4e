//! `yt2mp3 convert <video>` – headless mode: run one job and exit.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use yt2mp3_core::config::{AppConfig, JobSpec};
use yt2mp3_core::control::JobControl;
use yt2mp3_core::job::{Job, JobState};
use yt2mp3_core::registry::JobRegistry;
use yt2mp3_core::scheduler::JobScheduler;
use yt2mp3_core::tools;

#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    pub video: Vec<String>,
    pub output: Option<PathBuf>,
    pub segment_length: Option<u32>,
    pub segment_name: Option<String>,
}

pub async fn run_convert(cfg: &AppConfig, args: ConvertArgs) -> Result<ExitCode> {
    if args.video.iter().all(|v| v.trim().is_empty()) {
        bail!("no video given: pass a video id or URL");
    }
    let spec = JobSpec {
        video: args.video,
        output: args.output,
        segment_length: args.segment_length,
        segment_name: args.segment_name,
    };
    let job_config = spec.into_config(&cfg.job_defaults());
    if !job_config.is_complete() {
        bail!("incomplete job: segment length must be positive and segment name non-empty");
    }
    tools::check_requirements(&cfg.tools())?;

    let registry = Arc::new(JobRegistry::with_defaults(cfg.job_defaults()));
    let scheduler = JobScheduler::new(1, cfg.pipeline_env())?;
    let control = JobControl::new(registry, scheduler);
    let job = control.add_config(job_config);
    control.run(0)?;

    let mut ticker = tokio::time::interval(cfg.poll_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            res = &mut ctrl_c, if !interrupted => {
                if let Err(e) = res {
                    tracing::warn!("ctrl-c handler: {}", e);
                }
                interrupted = true;
                if job.stop() {
                    eprintln!("stopping...");
                }
            }
            _ = ticker.tick() => {
                print_pending_lines(&job);
                if !job.is_stoppable() {
                    break;
                }
            }
        }
    }

    // The outcome is recorded before the worker returns; wait for it to
    // finish cleanup before exiting.
    control.shutdown();
    tokio::task::block_in_place(|| control.join());
    print_pending_lines(&job);

    let state = job.state();
    tracing::info!(job = job.id(), %state, "convert done");
    if state == JobState::Finished {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("job {}", state);
        Ok(ExitCode::FAILURE)
    }
}

fn print_pending_lines(job: &Job) {
    while let Some(line) = job.next_log_line() {
        println!("{}", line);
    }
}
