//! Binaries the harness runs on the host: the Docker CLI for containers and
//! the emulated board, `ssh` and `scp` to reach the board. Their results use
//! the same [`CommandResult`] as commands run in the target.

use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    io,
    path::PathBuf,
    process::Command as StdCommand,
};

use log::trace;
use strum_macros::IntoStaticStr;

use harness_api::error::{ExecutionError, HarnessError, HarnessResultExt};

use crate::connection::{quote, CommandResult};

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("'{dependency}' is not on the PATH: {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to spawn '{dependency}': {source}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' {explanation}\n{output}")]
    ExecutionFailed {
        command: String,
        explanation: String,
        output: String,
    },
}

impl From<DependencyError> for HarnessError {
    #[track_caller]
    fn from(value: DependencyError) -> Self {
        match value {
            DependencyError::NotFound { dependency, source } => HarnessError::with_source(
                ExecutionError::MissingBinary {
                    binary: dependency.name(),
                },
                source.into(),
            ),
            DependencyError::CouldNotExecute { dependency, source } => HarnessError::with_source(
                ExecutionError::CommandCouldNotExecute {
                    binary: dependency.name(),
                },
                source.into(),
            ),
            DependencyError::ExecutionFailed {
                command,
                explanation,
                output,
            } => HarnessError::with_source(
                ExecutionError::CommandFailed {
                    command,
                    explanation,
                },
                anyhow::anyhow!(output),
            ),
        }
    }
}

pub trait DependencyResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, HarnessError>;
}

impl<T> DependencyResultExt<T> for Result<T, Box<DependencyError>> {
    #[track_caller]
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, HarnessError> {
        let result: Result<T, HarnessError> = self.map_err(|e| (*e).into());
        result.message(context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Docker,
    Scp,
    Ssh,

    /// Stands in for the Docker CLI in unit tests.
    #[cfg(test)]
    Sh,
    #[cfg(test)]
    #[strum(serialize = "qemu-system-arm-missing")]
    Missing,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Name of the binary, e.g. `docker`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Start building an invocation of the binary.
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: Vec::new(),
        }
    }
}

/// Invocation of a host binary.
pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn with_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args(args);
        self
    }

    /// The command line as it could be pasted into a shell.
    pub fn render_command(&self) -> String {
        std::iter::once(self.dependency.name().to_string())
            .chain(self.args.iter().map(|arg| quote(&arg.to_string_lossy())))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the binary and collect its result, whatever the exit code.
    pub fn output(&self) -> Result<CommandResult, Box<DependencyError>> {
        let rendered = self.render_command();
        trace!("Executing '{rendered}'");

        let output = StdCommand::new(self.dependency.path()?)
            .args(&self.args)
            .output()
            .map_err(|source| DependencyError::CouldNotExecute {
                dependency: self.dependency,
                source,
            })?;
        let result = CommandResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
        };

        trace!(
            "Executed '{rendered}': {}\nstdout:\n{}\nstderr:\n{}",
            result.explain_exit(),
            result.stdout,
            result.stderr
        );
        Ok(result)
    }

    /// Run the binary and fail unless it exits with 0.
    pub fn run_and_check(&self) -> Result<(), Box<DependencyError>> {
        self.checked_output().map(|_| ())
    }

    /// Run the binary and return its stdout, failing unless it exits with 0.
    pub fn output_and_check(&self) -> Result<String, Box<DependencyError>> {
        self.checked_output().map(|result| result.stdout)
    }

    fn checked_output(&self) -> Result<CommandResult, Box<DependencyError>> {
        let result = self.output()?;
        if result.success() {
            return Ok(result);
        }

        let output = match (result.stdout.trim(), result.stderr.trim()) {
            ("", "") => "(no output collected)".to_string(),
            (stdout, "") => format!("stdout:\n{stdout}"),
            ("", stderr) => format!("stderr:\n{stderr}"),
            (stdout, stderr) => format!("stdout:\n{stdout}\nstderr:\n{stderr}"),
        };
        Err(Box::new(DependencyError::ExecutionFailed {
            command: self.render_command(),
            explanation: result.explain_exit(),
            output,
        }))
    }
}
