//! External command execution.
//!
//! Every subprocess the pipeline starts (the project generator, git) goes
//! through a [`CommandRunner`]. The production implementation is
//! [`ProcessRunner`]; tests inject fakes through the same trait.
//!
//! A runner call spawns exactly one process and never retries. Callers see
//! either the complete stdout of a successful exit or a structured error;
//! partial output from a failed process is never returned as success.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{Result, ScaffdiffError};

/// A program invocation: program name, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command inside `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes external commands and captures their stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// Returns captured stdout on a zero exit status. Fails with
    /// [`ScaffdiffError::Command`] on non-zero exit, [`ScaffdiffError::Spawn`]
    /// if the process could not be started and [`ScaffdiffError::Timeout`]
    /// if a configured time limit expired.
    async fn run(&self, command: &CommandSpec) -> Result<String>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Runner without a time limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        let start = Instant::now();
        debug!(
            command = %command,
            working_dir = ?command.working_dir,
            "running command"
        );

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    record_duration(&command.program, "timeout", start);
                    warn!(command = %command, timeout_secs = limit.as_secs(), "command timed out");
                    ScaffdiffError::Timeout {
                        program: command.program.clone(),
                        after: limit,
                    }
                })?,
            None => cmd.output().await,
        }
        .map_err(|e| {
            record_duration(&command.program, "error", start);
            ScaffdiffError::Spawn {
                program: command.program.clone(),
                message: e.to_string(),
            }
        })?;

        if !output.status.success() {
            record_duration(&command.program, "error", start);
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(
                command = %command,
                exit_code,
                stderr_len = stderr.len(),
                "command failed"
            );
            return Err(ScaffdiffError::Command {
                program: command.program.clone(),
                exit_code,
                stderr,
            });
        }

        record_duration(&command.program, "ok", start);
        debug!(
            command = %command,
            duration_ms = start.elapsed().as_millis() as u64,
            stdout_len = output.stdout.len(),
            "command completed"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn record_duration(program: &str, status: &'static str, start: Instant) {
    metrics::histogram!(telemetry::COMMAND_DURATION_SECONDS,
        "program" => program.to_owned(),
        "status" => status,
    )
    .record(start.elapsed().as_secs_f64());
}
