//! CLI for yt2mp3.

mod commands;
mod control_socket;
mod present;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use yt2mp3_core::config::{self, AppConfig};

use commands::{
    run_batch, run_check, run_completions, run_convert, run_man, run_start, run_stop, ConvertArgs,
};

/// Top-level CLI for yt2mp3.
#[derive(Debug, Parser)]
#[command(name = "yt2mp3", version)]
#[command(about = "yt2mp3: download online videos and keep their audio as mp3", long_about = None)]
pub struct Cli {
    /// Read settings from this file instead of ~/.config/yt2mp3/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Convert one video without the interactive session (headless mode).
    Convert {
        /// Video id or URL. Only the first one is converted.
        video: Vec<String>,

        /// Output file, or output directory when segmenting. Defaults to the video id.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Split the audio into pieces of this many seconds.
        #[arg(long, value_name = "SECS")]
        segment_length: Option<u32>,

        /// Segment naming pattern (default "%03d" gives 000.mp3, 001.mp3, ...).
        #[arg(long, value_name = "PATTERN")]
        segment_name: Option<String>,
    },

    /// Run every job of a jobs file in parallel, with live status.
    Batch {
        /// TOML (or .json) file with [[job]] entries.
        jobs_file: PathBuf,

        /// Do not listen for start/stop commands from other yt2mp3 invocations.
        #[arg(long)]
        no_control_socket: bool,
    },

    /// Ask a running batch session to start a job (position as listed, from 0).
    Start {
        #[arg(required_unless_present = "all")]
        index: Option<usize>,

        /// Start every runnable job.
        #[arg(long, conflicts_with = "index")]
        all: bool,
    },

    /// Ask a running batch session to stop a job.
    Stop {
        #[arg(required_unless_present = "all")]
        index: Option<usize>,

        /// Stop every running or queued job.
        #[arg(long, conflicts_with = "index")]
        all: bool,
    },

    /// Check that the fetcher and transcoder are installed.
    Check,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff).
    Man,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let cfg = match path {
        Some(path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<ExitCode> {
        let cli = Cli::parse();
        let config_path = cli.config.as_deref();

        match cli.command {
            CliCommand::Convert {
                video,
                output,
                segment_length,
                segment_name,
            } => {
                let cfg = load_config(config_path)?;
                let args = ConvertArgs {
                    video,
                    output,
                    segment_length,
                    segment_name,
                };
                run_convert(&cfg, args).await
            }
            CliCommand::Batch {
                jobs_file,
                no_control_socket,
            } => {
                let cfg = load_config(config_path)?;
                run_batch(&cfg, &jobs_file, !no_control_socket).await
            }
            CliCommand::Start { index, all } => run_start(index, all).await,
            CliCommand::Stop { index, all } => run_stop(index, all).await,
            CliCommand::Check => {
                let cfg = load_config(config_path)?;
                run_check(&cfg)
            }
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man(),
        }
    }
}

#[cfg(test)]
mod tests;
