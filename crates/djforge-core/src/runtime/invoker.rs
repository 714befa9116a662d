//! External tool invocation
//!
//! Every command runs from an argument vector; nothing goes through a shell.
//! [`ProcessInvoker`] streams the child's output while it runs and kills it
//! once the timeout elapses.

use colored::Colorize;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Default limit for a single tool run (10 minutes)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// A program, its arguments and the directory it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Command line for messages, quoting arguments that contain spaces
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_command())
    }
}

/// How a tool run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Exited(i32),
    /// Ended by a signal without an exit code
    Terminated,
    TimedOut(Duration),
}

impl ToolStatus {
    pub fn success(&self) -> bool {
        matches!(self, ToolStatus::Exited(0))
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ToolStatus::Exited(code),
            None => ToolStatus::Terminated,
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Exited(code) => write!(f, "exit code {}", code),
            ToolStatus::Terminated => write!(f, "terminated by signal"),
            ToolStatus::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
        }
    }
}

/// Runs external programs for the pipeline
///
/// Spawn failures come back as `Err`; a program that ran and failed is an
/// `Ok` with a non-success [`ToolStatus`].
#[allow(async_fn_in_trait)]
pub trait ToolInvoker {
    async fn invoke(&self, invocation: &Invocation) -> io::Result<ToolStatus>;
}

/// [`ToolInvoker`] backed by real child processes
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    timeout: Duration,
    echo: bool,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

impl ProcessInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            echo: true,
        }
    }

    /// Print the child's output as it arrives (on by default)
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn emit_stdout(&self, line: &str) {
        tracing::trace!(target: "djforge::tool", "{}", line);
        if self.echo {
            println!("  {}", line.dimmed());
        }
    }

    fn emit_stderr(&self, line: &str) {
        tracing::trace!(target: "djforge::tool", stream = "stderr", "{}", line);
        if self.echo {
            eprintln!("  {}", line.yellow());
        }
    }
}

impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &Invocation) -> io::Result<ToolStatus> {
        tracing::debug!(command = %invocation, "running tool");

        let mut command = TokioCommand::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr not captured"))?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();

        let run = async {
            let mut stdout_open = true;
            let mut stderr_open = true;
            while stdout_open || stderr_open {
                tokio::select! {
                    line = stdout_reader.next_line(), if stdout_open => match line {
                        Ok(Some(line)) => self.emit_stdout(&line),
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            tracing::warn!("error reading stdout: {}", e);
                            stdout_open = false;
                        }
                    },
                    line = stderr_reader.next_line(), if stderr_open => match line {
                        Ok(Some(line)) => self.emit_stderr(&line),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            tracing::warn!("error reading stderr: {}", e);
                            stderr_open = false;
                        }
                    },
                }
            }
            child.wait().await
        };

        let outcome = timeout(self.timeout, run).await;
        let status = match outcome {
            Ok(status) => ToolStatus::from(status?),
            Err(_) => {
                tracing::warn!(
                    command = %invocation,
                    timeout_secs = self.timeout.as_secs(),
                    "tool timed out, killing it"
                );
                child.kill().await?;
                ToolStatus::TimedOut(self.timeout)
            }
        };

        tracing::debug!(command = %invocation, %status, "tool finished");
        Ok(status)
    }
}
