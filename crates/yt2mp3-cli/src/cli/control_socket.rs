//! Control socket: server (during `yt2mp3 batch`) and client (`yt2mp3 start/stop`).
//! Protocol: one command line in, one reply line out. Commands: "run <i>",
//! "stop <i>", "run-all", "stop-all".

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use yt2mp3_core::control::{self, ControlCommand, JobControl};

/// Binds `path` (replacing a stale socket) and spawns a task that applies
/// every received command to `job_control`. Malformed lines get an error reply.
pub fn spawn_control_listener(
    job_control: Arc<JobControl>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("control socket bind {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&job_control);
                    tokio::spawn(async move {
                        if let Err(e) = serve_client(stream, &control).await {
                            tracing::debug!("control client: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_client(stream: UnixStream, control: &JobControl) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<ControlCommand>() {
            Ok(command) => {
                tracing::info!(%command, "control command");
                control.apply(command)
            }
            Err(e) => format!("error: {}", e),
        };
        write.write_all(reply.as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

/// Sends one command line and returns the session's reply.
pub async fn send_command(socket_path: &Path, command: ControlCommand) -> Result<String> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{}\n", command.to_line()).as_bytes())
        .await?;
    write.shutdown().await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .unwrap_or_default();
    Ok(reply)
}

fn session_socket_path() -> Result<PathBuf> {
    let path = control::default_control_socket_path()?;
    if !path.exists() {
        bail!(
            "no running batch session (control socket {} not found)",
            path.display()
        );
    }
    Ok(path)
}

/// Client side of `yt2mp3 start/stop`: prints the reply, fails on an error reply.
pub async fn send_to_session(command: ControlCommand) -> Result<ExitCode> {
    let path = session_socket_path()?;
    let reply = send_command(&path, command).await?;
    println!("{}", reply);
    if reply.starts_with("error:") {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yt2mp3_core::job::JobConfig;
    use yt2mp3_core::pipeline::PipelineEnv;
    use yt2mp3_core::registry::JobRegistry;
    use yt2mp3_core::scheduler::JobScheduler;
    use yt2mp3_core::tools::ToolPaths;

    #[tokio::test]
    async fn commands_round_trip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let env = PipelineEnv::new(
            ToolPaths {
                fetcher: "/nonexistent/fetcher".into(),
                transcoder: "/nonexistent/transcoder".into(),
            },
            dir.path().join("work"),
        );
        let registry = Arc::new(JobRegistry::new());
        registry.create(JobConfig::new("abc", dir.path().join("out")));
        let control = Arc::new(JobControl::new(registry, JobScheduler::new(1, env).unwrap()));
        let socket = dir.path().join("control.sock");
        let server = spawn_control_listener(Arc::clone(&control), &socket).unwrap();

        let reply = send_command(&socket, ControlCommand::Stop(0)).await.unwrap();
        assert_eq!(reply, "job 0 was not active");
        let reply = send_command(&socket, ControlCommand::Run(3)).await.unwrap();
        assert_eq!(reply, "error: no job at position 3");
        let reply = send_command(&socket, ControlCommand::StopAll).await.unwrap();
        assert_eq!(reply, "0 job(s) stopped");

        server.abort();
        control.shutdown();
    }
}
