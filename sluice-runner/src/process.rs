//! Process boundary
//!
//! Launches a job's command through the configured shell and pumps its
//! stdout and stderr into a [`Log`] until both pipes are closed.

use std::io::Write;
use std::process::{ExitStatus, Stdio};

use sluice_core::{LineWriter, Log};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::RunnerConfig;

/// Reasons a command could not be run to completion
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} pipe not available")]
    MissingPipe(&'static str),

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs `command` via the shell, capturing its output into `log`
///
/// Returns once the process has exited and both pipes reached end of file.
/// The log is flushed before returning, so a trailing unterminated line is
/// part of it.
pub async fn run_command(
    config: &RunnerConfig,
    command: &str,
    log: &Log,
) -> Result<ExitStatus, ProcessError> {
    debug!("Launching: {} {} {:?}", config.shell, config.shell_arg, command);

    let mut child = Command::new(&config.shell)
        .arg(&config.shell_arg)
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            shell: config.shell.clone(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(ProcessError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(ProcessError::MissingPipe("stderr"))?;

    let (status, (), ()) = tokio::join!(
        child.wait(),
        pump(stdout, log.stdout(), config.read_chunk_size),
        pump(stderr, log.stderr(), config.read_chunk_size),
    );

    log.flush();

    status.map_err(ProcessError::Wait)
}

/// Copies a pipe into a line writer chunk by chunk until end of file
async fn pump<R>(mut reader: R, mut writer: LineWriter, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]) {
                    warn!("Failed to capture {} output: {}", writer.stream(), e);
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read {}: {}", writer.stream(), e);
                break;
            }
        }
    }
}
