use std::process::ExitCode;

use yt2mp3_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging as early as possible; stderr if the state dir is unusable.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", err);
    }

    match CliCommand::run_from_args().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("yt2mp3 error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
