//! External tool executor.
//! Every invocation is bounded by a timeout; a timeout is reported like any other tool failure.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::monitor::signal::SignalError;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Program plus leading arguments: a tool name, an absolute path, or a `sh -c` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub base_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// `sh -c <script>`; extra arguments arrive as `$1`, `$2`, ...
    pub fn shell(script: impl Into<String>) -> Self {
        Self {
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), script.into(), "sh".to_string()],
        }
    }
}

/// Runs external tools with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `program args...` and capture its output regardless of exit status.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, SignalError> {
        self.run_in(program, args, None).await
    }

    /// Like `run`, but with a working directory.
    pub async fn run_in(
        &self,
        program: &str,
        args: &[&str],
        dir: Option<&Path>,
    ) -> Result<CommandOutput, SignalError> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        trace!("Executing: {} {:?}", program, args);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SignalError::ToolUnavailable {
                    tool: program.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Err(e)) => return Err(SignalError::Io(e)),
            Err(_) => {
                return Err(SignalError::Timeout {
                    tool: program.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run and require a zero exit status.
    pub async fn run_checked(&self, program: &str, args: &[&str]) -> Result<String, SignalError> {
        self.run_checked_in(program, args, None).await
    }

    pub async fn run_checked_in(
        &self,
        program: &str,
        args: &[&str],
        dir: Option<&Path>,
    ) -> Result<String, SignalError> {
        let output = self.run_in(program, args, dir).await?;
        if !output.success() {
            return Err(SignalError::CommandFailed {
                tool: program.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    pub async fn run_tool(
        &self,
        tool: &ToolCommand,
        args: &[&str],
    ) -> Result<CommandOutput, SignalError> {
        let mut all: Vec<&str> = tool.base_args.iter().map(String::as_str).collect();
        all.extend_from_slice(args);
        self.run(&tool.program, &all).await
    }

    pub async fn run_tool_checked(
        &self,
        tool: &ToolCommand,
        args: &[&str],
    ) -> Result<String, SignalError> {
        self.run_tool_checked_in(tool, args, None).await
    }

    pub async fn run_tool_checked_in(
        &self,
        tool: &ToolCommand,
        args: &[&str],
        dir: Option<&Path>,
    ) -> Result<String, SignalError> {
        let mut all: Vec<&str> = tool.base_args.iter().map(String::as_str).collect();
        all.extend_from_slice(args);
        self.run_checked_in(&tool.program, &all, dir).await
    }

    /// Run a command line through `sh -c`.
    pub async fn run_shell(&self, command_line: &str) -> Result<String, SignalError> {
        self.run_tool_checked(&ToolCommand::shell(command_line), &[]).await
    }

    /// A [`BoundedCall`] sharing this executor's timeout.
    pub fn bounded_call(&self, name: &'static str) -> BoundedCall {
        BoundedCall::new(name, self.timeout)
    }
}

/// Runs a blocking filesystem call (stat, statvfs) on the blocking pool under a timeout.
///
/// A call into a hung network mount cannot be cancelled, so its thread stays
/// parked in the kernel. While such a call is outstanding, further calls fail
/// immediately with [`SignalError::Timeout`] instead of parking more threads.
#[derive(Debug)]
pub struct BoundedCall {
    name: &'static str,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
}

impl BoundedCall {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run<T, F>(&self, call: F) -> Result<T, SignalError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, SignalError> + Send + 'static,
    {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            trace!("{}: previous call still blocked", self.name);
            return Err(self.timed_out());
        }

        let in_flight = self.in_flight.clone();
        let task = tokio::task::spawn_blocking(move || {
            let result = call();
            in_flight.store(false, Ordering::Release);
            result
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.in_flight.store(false, Ordering::Release);
                Err(SignalError::Unparseable(format!("{} task failed: {}", self.name, e)))
            }
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> SignalError {
        SignalError::Timeout {
            tool: self.name.to_string(),
            seconds: self.timeout.as_secs(),
        }
    }
}
