//! Builder for executing external tool commands with timeout support.
//!
//! Output is read line by line from both pipes while the process runs, so
//! callers can observe progress (ffmpeg `-progress`, `mc cp` transfer lines)
//! before the process exits.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use siasplit_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8, one `\n` per line).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8, one `\n` per line).
    pub stderr: String,
}

/// One line observed on a child process pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLine<'a> {
    Stdout(&'a str),
    Stderr(&'a str),
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use siasplit_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> siasplit_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/video.mp4")
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
    /// Indices into `args` that must not appear in logs.
    secret_args: Vec<usize>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            secret_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
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

    /// Append an argument that is masked in log output (credentials).
    pub fn secret_arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.secret_args.push(self.args.len());
        self.args.push(s.into());
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Arguments as they may be logged, with secret arguments masked.
    pub fn display_args(&self) -> Vec<&str> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if self.secret_args.contains(&i) {
                    "***"
                } else {
                    a.as_str()
                }
            })
            .collect()
    }

    /// Short program name used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, the process times out, or
    /// it exits with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let output = self.execute_streaming(|_| {}).await?;

        if !output.status.success() {
            return Err(Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(output)
    }

    /// Execute the command, handing every output line to `on_line` as soon as
    /// it is read.
    ///
    /// Unlike [`ToolCommand::execute`] a non-zero exit status is *not* an
    /// error here; the caller inspects [`ToolOutput::status`] and decides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, a pipe cannot be read, or
    /// the process times out (the child is killed).
    pub async fn execute_streaming<F>(&self, mut on_line: F) -> Result<ToolOutput>
    where
        F: FnMut(OutputLine<'_>),
    {
        let program_name = self.program_name();
        tracing::debug!("exec: {} {:?}", self.program.display(), self.display_args());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(Error::tool(&program_name, "output pipes were not captured"));
        };

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();

        let pump = async {
            let mut stdout_done = false;
            let mut stderr_done = false;

            while !(stdout_done && stderr_done) {
                tokio::select! {
                    line = stdout_lines.next_line(), if !stdout_done => match line? {
                        Some(line) => {
                            on_line(OutputLine::Stdout(&line));
                            stdout_buf.push_str(&line);
                            stdout_buf.push('\n');
                        }
                        None => stdout_done = true,
                    },
                    line = stderr_lines.next_line(), if !stderr_done => match line? {
                        Some(line) => {
                            on_line(OutputLine::Stderr(&line));
                            stderr_buf.push_str(&line);
                            stderr_buf.push('\n');
                        }
                        None => stderr_done = true,
                    },
                }
            }

            Ok::<ExitStatus, std::io::Error>(child.wait().await?)
        };

        let result = tokio::time::timeout(self.timeout, pump).await;

        match result {
            Ok(Ok(status)) => Ok(ToolOutput {
                status,
                stdout: stdout_buf,
                stderr: stderr_buf,
            }),
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child is killed when it is dropped on return.
            Err(_elapsed) => Err(Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("failed to spawn"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn non_zero_exit_is_error_for_execute() {
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken >&2; exit 3"])
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("broken"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn streaming_separates_pipes() {
        let mut seen = Vec::new();
        let output = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo one; echo warn >&2; echo two; exit 2"])
            .execute_streaming(|line| seen.push(format!("{line:?}")))
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(2));
        assert_eq!(output.stdout, "one\ntwo\n");
        assert_eq!(output.stderr, "warn\n");
        assert!(seen.contains(&"Stdout(\"one\")".to_string()));
        assert!(seen.contains(&"Stderr(\"warn\")".to_string()));
        let one = seen.iter().position(|l| l.contains("one")).unwrap();
        let two = seen.iter().position(|l| l.contains("two")).unwrap();
        assert!(one < two);
    }

    #[test]
    fn secret_args_are_masked_for_logging() {
        let mut cmd = ToolCommand::new(PathBuf::from("mc"));
        cmd.args(["alias", "set", "renterd", "http://localhost:9885"])
            .secret_arg("access")
            .secret_arg("secret");

        assert_eq!(cmd.get_args().last().map(String::as_str), Some("secret"));
        assert_eq!(
            cmd.display_args(),
            vec!["alias", "set", "renterd", "http://localhost:9885", "***", "***"]
        );
    }

    #[tokio::test]
    async fn timeout_fires() {
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }
}
