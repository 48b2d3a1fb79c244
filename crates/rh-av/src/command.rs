//! Builder for executing external tool commands.
//!
//! Three execution styles cover every ffmpeg/ffprobe use in the engine:
//! capture-everything ([`ToolCommand::execute`]), stream stderr lines while the
//! process runs ([`ToolCommand::execute_with_stderr_callback`]), and hand the
//! live child back to the caller with stdout piped ([`ToolCommand::spawn_stdout`]).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use rh_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> rh_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_entries", "format=duration"])
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path. No deadline is set.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set (or clear) the maximum execution time.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments accumulated so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`rh_core::Error::Tool`] if spawning fails, the deadline
    /// expires (the child is killed), or the process exits non-zero (message
    /// includes stderr).
    pub async fn execute(&self) -> rh_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = self.command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| rh_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        // Dropping the wait future on timeout drops the child, and
        // kill_on_drop reaps it.
        let wait = child.wait_with_output();
        let result = match self.timeout {
            Some(d) => match tokio::time::timeout(d, wait).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    return Err(rh_core::Error::tool(
                        program_name,
                        format!("timed out after {d:?}"),
                    ))
                }
            },
            None => wait.await,
        };

        let output = result.map_err(|e| {
            rh_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(rh_core::Error::tool(
                program_name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }

    /// Execute the command, feeding every stderr line to `on_line` as it is
    /// produced. Stdout is discarded.
    ///
    /// The child is killed when `cancel` fires or the deadline expires.
    /// `key=value` progress lines are passed to the callback but left out of
    /// the error message built from the stderr tail.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
        cancel: Option<CancellationToken>,
    ) -> rh_core::Result<()> {
        let program_name = self.program_name();

        let mut cmd = self.command();
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| rh_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| rh_core::Error::tool(&program_name, "stderr was not captured"))?;
        let mut lines = BufReader::new(stderr).lines();

        let cancel = cancel.unwrap_or_default();
        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !is_progress_line(&line) {
                            if tail.len() == STDERR_TAIL {
                                tail.pop_front();
                            }
                            tail.push_back(line.clone());
                        }
                        on_line(&line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        return Err(rh_core::Error::tool(
                            program_name,
                            format!("failed to read stderr: {e}"),
                        ));
                    }
                },
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(rh_core::Error::tool(program_name, "cancelled"));
                }
                _ = &mut deadline => {
                    let _ = child.kill().await;
                    return Err(rh_core::Error::tool(
                        program_name,
                        format!("timed out after {:?}", timeout.unwrap_or_default()),
                    ));
                }
            }
        }

        let status = child.wait().await.map_err(|e| {
            rh_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        if !status.success() {
            let tail: Vec<String> = tail.into_iter().collect();
            return Err(rh_core::Error::tool(
                program_name,
                format!("exited with status {status}: {}", tail.join("\n").trim()),
            ));
        }

        Ok(())
    }

    /// Spawn the command with stdout and stderr piped and hand the child to
    /// the caller. The child is killed if it is dropped while still running.
    pub fn spawn_stdout(&self) -> rh_core::Result<Child> {
        let program_name = self.program_name();
        let mut cmd = self.command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.spawn()
            .map_err(|e| rh_core::Error::tool(program_name, format!("failed to spawn: {e}")))
    }
}

/// `ffmpeg -progress` emits bare `key=value` lines.
fn is_progress_line(line: &str) -> bool {
    line.split_once('=').is_some_and(|(key, _)| {
        !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    })
}
