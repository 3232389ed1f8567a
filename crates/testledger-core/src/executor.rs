//! Test command assembly and the child process that runs it.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::RunError;

/// A fully assembled test invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TestCommand {
    /// `base + exclude_args + selection_args`, split into program and args.
    pub fn assemble(
        base: &[String],
        exclude_args: &[String],
        selection_args: &[String],
    ) -> Result<Self, RunError> {
        let (program, rest) = base.split_first().ok_or(RunError::EmptyCommand)?;
        let args = rest
            .iter()
            .chain(exclude_args)
            .chain(selection_args)
            .cloned()
            .collect();
        Ok(Self {
            program: program.clone(),
            args,
        })
    }

    /// Space-joined rendering for display.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of one finished test process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub duration: Duration,
}

/// Runs a test command to completion.
///
/// The seam between run orchestration and the operating system; tests swap
/// in a recording implementation.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, command: &TestCommand) -> Result<ExecutionResult, RunError>;
}

/// Spawns the test command as a single child process with inherited stdio
/// and waits for it. No timeout and no restart.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    working_dir: PathBuf,
    announce: bool,
}

impl ProcessExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            announce: false,
        }
    }

    /// Print `Running: <command>` to stdout before spawning.
    pub fn announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }
}

#[async_trait]
impl TestExecutor for ProcessExecutor {
    async fn execute(&self, command: &TestCommand) -> Result<ExecutionResult, RunError> {
        let rendered = command.display();
        if self.announce {
            println!("Running: {rendered}");
            println!();
        }
        info!(command = %rendered, dir = %self.working_dir.display(), "spawning test process");

        let start = Instant::now();
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RunError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let status = child.wait().await.map_err(|source| RunError::Wait {
            command: rendered.clone(),
            source,
        })?;
        let duration = start.elapsed();
        let exit_code = exit_code_of(status);
        debug!(exit_code, elapsed_ms = duration.as_millis() as u64, "test process exited");

        Ok(ExecutionResult {
            exit_code,
            duration,
        })
    }
}

/// The exit code to propagate for a finished child.
///
/// Normal exits pass through verbatim. On Unix a signal-terminated child
/// maps to `128 + signal`, matching shell convention.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
