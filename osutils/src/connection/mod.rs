//! Shell access to the environment under test.
//!
//! Scenarios only ever talk to their target through a [`Connection`]: a
//! generic container is reached with `docker exec`, the emulated board over
//! SSH. Both return the same [`CommandResult`], whatever the exit code.

use std::path::Path;

use log::{debug, trace};

use harness_api::error::{ExecutionError, HarnessError};

pub mod docker;
#[cfg(any(test, feature = "test-utilities"))]
pub mod mock;
pub mod ssh;

pub use docker::DockerConnection;
pub use ssh::{SshConnection, SshTarget};

/// Outcome of a command run in the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// `None` when the command was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Produces a string explaining the exit status of the command.
    pub fn explain_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exited with status: {code}"),
            None => "terminated by signal".into(),
        }
    }

    /// Fails with the output of the command unless it exited with 0.
    #[track_caller]
    pub fn check(self, command: &str) -> Result<Self, HarnessError> {
        if self.success() {
            return Ok(self);
        }

        Err(HarnessError::with_source(
            ExecutionError::CommandFailed {
                command: command.into(),
                explanation: self.explain_exit(),
            },
            anyhow::anyhow!("stdout:\n{}\nstderr:\n{}", self.stdout, self.stderr),
        ))
    }
}

/// A shell in the environment under test.
pub trait Connection {
    /// Run `command` with the target shell and return its result, even if it
    /// failed. Only errors reaching the target are returned as `Err`.
    fn execute(&self, command: &str) -> Result<CommandResult, HarnessError>;

    /// Copy a host file into the target. Without a destination the file is
    /// placed in the default working directory of the target.
    fn put(&self, source: &Path, destination: Option<&str>) -> Result<(), HarnessError>;

    /// Whether privileged commands must go through `sudo`.
    fn needs_sudo(&self) -> bool;

    /// Short description for logs, e.g. `docker:3f2a9c1b` or `pi@localhost:5555`.
    fn describe(&self) -> String;

    /// Run `command` and fail unless it exits with 0.
    #[track_caller]
    fn run(&self, command: &str) -> Result<CommandResult, HarnessError> {
        debug!("[{}] {command}", self.describe());
        let result = self.execute(command)?;
        trace!(
            "[{}] {}\nstdout:\n{}\nstderr:\n{}",
            self.describe(),
            result.explain_exit(),
            result.stdout,
            result.stderr
        );
        result.check(command)
    }

    /// Run `command` without caring about its exit code.
    fn run_warn(&self, command: &str) -> Result<CommandResult, HarnessError> {
        debug!("[{}] {command} (warn)", self.describe());
        let result = self.execute(command)?;
        trace!(
            "[{}] {}\nstdout:\n{}\nstderr:\n{}",
            self.describe(),
            result.explain_exit(),
            result.stdout,
            result.stderr
        );
        Ok(result)
    }

    /// Run `command` as root and fail unless it exits with 0.
    #[track_caller]
    fn sudo(&self, command: &str) -> Result<CommandResult, HarnessError> {
        self.run(&privileged(self.needs_sudo(), command))
    }

    /// Run `command` as root without caring about its exit code.
    fn sudo_warn(&self, command: &str) -> Result<CommandResult, HarnessError> {
        self.run_warn(&privileged(self.needs_sudo(), command))
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&self, command: &str) -> Result<CommandResult, HarnessError> {
        (**self).execute(command)
    }

    fn put(&self, source: &Path, destination: Option<&str>) -> Result<(), HarnessError> {
        (**self).put(source, destination)
    }

    fn needs_sudo(&self) -> bool {
        (**self).needs_sudo()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn privileged(needs_sudo: bool, command: &str) -> String {
    if needs_sudo {
        format!("sudo bash -c {}", quote(command))
    } else {
        command.to_string()
    }
}

/// Quote `value` as a single shell word.
pub fn quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
