//! `yt2mp3 stop <index>` – ask a running batch session to stop a job.

use anyhow::Result;
use std::process::ExitCode;
use yt2mp3_core::control::ControlCommand;

use crate::cli::control_socket;

pub async fn run_stop(index: Option<usize>, all: bool) -> Result<ExitCode> {
    let command = match index {
        Some(i) if !all => ControlCommand::Stop(i),
        _ => ControlCommand::StopAll,
    };
    control_socket::send_to_session(command).await
}
