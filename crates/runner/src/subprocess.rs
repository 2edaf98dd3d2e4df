//! Child process execution with piped I/O and a hard timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("process timed out after {elapsed_ms}ms and was killed")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to feed a child process and how long to let it run.
#[derive(Debug, Clone)]
pub struct CommandInput {
    /// Bytes written to the child's stdin before it is closed.
    pub stdin: Vec<u8>,
    pub working_directory: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn `cmd`, write `input.stdin`, capture stdout/stderr, enforce the
/// timeout. The child is killed if the timeout fires or the returned future
/// is dropped.
pub async fn run_command(
    cmd: &mut Command,
    input: CommandInput,
) -> Result<CommandOutput, SubprocessError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &input.working_directory {
        cmd.current_dir(dir);
    }

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|source| SubprocessError::Spawn { program, source })?;

    // Readers and the stdin writer run concurrently with the wait, so the
    // timeout covers a child that never reads its input or fills a pipe.
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));
    let stdin_task = tokio::spawn(write_stream(child.stdin.take(), input.stdin));

    let waited = tokio::time::timeout(input.timeout, child.wait()).await;
    stdin_task.abort();

    match waited {
        Ok(Ok(status)) => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(CommandOutput {
                stdout,
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(e)) => Err(SubprocessError::Io(e)),
        Err(_elapsed) => {
            // `child` is dropped here and killed by `kill_on_drop`.
            Err(SubprocessError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Write `bytes` to the child's stdin and close it.
async fn write_stream<W: AsyncWrite + Unpin>(handle: Option<W>, bytes: Vec<u8>) {
    if let Some(mut h) = handle {
        // The child may exit without reading stdin; a broken pipe is fine.
        let _ = h.write_all(&bytes).await;
        let _ = h.shutdown().await;
    }
}

/// Read an entire output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}
