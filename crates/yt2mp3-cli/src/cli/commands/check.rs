//! `yt2mp3 check` – verify the external tools are installed.

use anyhow::Result;
use std::process::ExitCode;
use yt2mp3_core::config::AppConfig;
use yt2mp3_core::tools;

pub fn run_check(cfg: &AppConfig) -> Result<ExitCode> {
    let tools = cfg.tools();
    tools::check_requirements(&tools)?;
    for program in [&tools.fetcher, &tools.transcoder] {
        let resolved = tools::resolve_program(program).unwrap_or_else(|| program.clone());
        println!("{:<12} {}", program.display(), resolved.display());
    }
    Ok(ExitCode::SUCCESS)
}
