//! Subprocess execution for CLI-driven backends.
//!
//! Processes are spawned with `kill_on_drop`, so dropping the future (which is
//! what happens when the cancellation token wins the race) terminates the child.

use super::{BackendError, BackendResult, OutputSink};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of stderr lines kept for error messages.
const DIAGNOSTIC_LINES: usize = 20;

/// Locate a binary, honoring an environment override before searching `PATH`.
pub(crate) fn find_binary(name: &str, env_override: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_override) {
        let path = PathBuf::from(path);
        return path.exists().then_some(path);
    }

    search_path(Path::new(name))
}

/// Resolve a bare program name against `PATH`.
pub(crate) fn search_path(name: &Path) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

/// Short human-readable form of a command ("docker push").
pub(crate) fn describe(command: &Command) -> String {
    let std = command.as_std();
    let program = PathBuf::from(std.get_program());
    let program = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string());

    match std.get_args().next() {
        Some(sub) => format!("{} {}", program, sub.to_string_lossy()),
        None => program,
    }
}

/// Run a command to completion.
///
/// With a sink, stdout and stderr lines are forwarded to it as they arrive and
/// an empty string is returned. Without one, stdout is captured and returned.
pub(crate) async fn run(
    mut command: Command,
    cancel: &CancellationToken,
    out: Option<OutputSink<'_>>,
) -> BackendResult<String> {
    let described = describe(&command);
    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

    debug!(command = %described, "Running");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(command = %described, "Cancelled, terminating process");
            Err(BackendError::Cancelled)
        }
        result = drive(command, &described, out) => result,
    }
}

async fn drive(
    mut command: Command,
    display: &str,
    mut out: Option<OutputSink<'_>>,
) -> BackendResult<String> {
    let mut child = command
        .spawn()
        .map_err(|e| BackendError::Spawn { command: display.to_string(), source: e })?;

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            return Err(BackendError::InvalidOutput {
                command: display.to_string(),
                reason: "process pipes unavailable".to_string(),
            })
        }
    };

    let read_failed = |e: std::io::Error| BackendError::CommandFailed {
        command: display.to_string(),
        reason: format!("reading output: {}", e),
    };

    // Output is handled as raw bytes; tools may print anything, valid UTF-8 or not.
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let (mut stdout_line, mut stderr_line) = (Vec::new(), Vec::new());
    let mut captured: Vec<u8> = Vec::new();
    let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_LINES);
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut stdout_line), if stdout_open => {
                if read.map_err(read_failed)? == 0 {
                    stdout_open = false;
                } else {
                    match out.as_deref_mut() {
                        Some(sink) => emit(sink, &stdout_line).await?,
                        None => captured.extend_from_slice(&stdout_line),
                    }
                    stdout_line.clear();
                }
            }
            read = stderr.read_until(b'\n', &mut stderr_line), if stderr_open => {
                if read.map_err(read_failed)? == 0 {
                    stderr_open = false;
                } else {
                    if let Some(sink) = out.as_deref_mut() {
                        emit(sink, &stderr_line).await?;
                    }
                    if diagnostics.len() == DIAGNOSTIC_LINES {
                        diagnostics.pop_front();
                    }
                    let line = String::from_utf8_lossy(&stderr_line);
                    diagnostics.push_back(line.trim_end_matches(['\n', '\r']).to_string());
                    stderr_line.clear();
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| BackendError::Spawn { command: display.to_string(), source: e })?;

    if let Some(sink) = out.as_deref_mut() {
        sink.flush().await.map_err(BackendError::Output)?;
    }

    if !status.success() {
        let detail = Vec::from(diagnostics).join("\n");
        let reason = if detail.trim().is_empty() {
            status.to_string()
        } else {
            format!("{} ({})", detail.trim(), status)
        };
        return Err(BackendError::CommandFailed { command: display.to_string(), reason });
    }

    Ok(String::from_utf8_lossy(&captured).into_owned())
}

/// Forward one line to the sink, terminating it if the stream ended mid-line.
async fn emit(sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send), line: &[u8]) -> BackendResult<()> {
    sink.write_all(line).await.map_err(BackendError::Output)?;
    if !line.ends_with(b"\n") {
        sink.write_all(b"\n").await.map_err(BackendError::Output)?;
    }
    Ok(())
}
