//! `yt2mp3 man` – man page on stdout.

use anyhow::Result;
use clap::CommandFactory;
use std::io;
use std::process::ExitCode;

use crate::cli::Cli;

pub fn run_man() -> Result<ExitCode> {
    let man = clap_mangen::Man::new(Cli::command());
    man.render(&mut io::stdout())?;
    Ok(ExitCode::SUCCESS)
}
