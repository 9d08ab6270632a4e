//! `yt2mp3 start <index>` – ask a running batch session to run a job.

use anyhow::Result;
use std::process::ExitCode;
use yt2mp3_core::control::ControlCommand;

use crate::cli::control_socket;

pub async fn run_start(index: Option<usize>, all: bool) -> Result<ExitCode> {
    let command = match index {
        Some(i) if !all => ControlCommand::Run(i),
        _ => ControlCommand::RunAll,
    };
    control_socket::send_to_session(command).await
}
