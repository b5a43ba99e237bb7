use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// The harness failed to initialize.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationError {
    #[error("Failed to load configuration from '{path}'")]
    LoadConfig { path: String },
    #[error("Failed to parse configuration")]
    ParseConfig,
    #[error("Failed to set up logging")]
    SetupLogging,
    #[error("Failed to start script server on port {port}")]
    StartScriptServer { port: u16 },
    #[error("Script server is not serving '{file}'")]
    ScriptServerNotReady { file: String },
    #[error("Failed to write report to '{path}'")]
    WriteReport { path: String },
}

/// The harness was given invalid input.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Unknown package '{name}'")]
    UnknownPackage { name: String },
    #[error("Unknown suite '{name}'")]
    UnknownSuite { name: String },
    #[error("No version configured for '{key}'")]
    MissingVersion { key: String },
    #[error("Invalid package version override '{value}', expected NAME=VERSION")]
    InvalidVersionOverride { value: String },
    #[error("Invalid value '{value}' for environment variable '{variable}'")]
    InvalidEnvironmentVariable { variable: String, value: String },
    #[error("No built packages found in '{path}'")]
    NoBuiltPackages { path: String },
    #[error("Built package '{path}' does not exist")]
    MissingBuiltPackage { path: String },
}

/// An environment could not be provisioned or torn down.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningError {
    #[error("Failed to start container from image '{image}'")]
    StartContainer { image: String },
    #[error("Emulated device did not boot within {timeout_secs} seconds")]
    BootTimeout { timeout_secs: u64 },
    #[error("SSH connection to '{host}' could not be established")]
    SshUnreachable { host: String },
    #[error("Failed to prepare environment")]
    PrepareEnvironment,
    #[error("Container '{id}' is gone")]
    ContainerGone { id: String },
    #[error("Failed to tear down container '{id}'")]
    Teardown { id: String },
    #[error("Environment of suite '{suite}' could not be provisioned")]
    SuiteEnvironment { suite: String },
}

/// A command could not be run on the host or the target.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionError {
    #[error("Required binary '{binary}' is not available on the host")]
    MissingBinary { binary: &'static str },
    #[error("Failed to execute '{binary}'")]
    CommandCouldNotExecute { binary: &'static str },
    #[error("Command '{command}' failed: {explanation}")]
    CommandFailed {
        command: String,
        explanation: String,
    },
    #[error("Failed to copy '{source_path}' to '{destination}'")]
    CopyFailed {
        source_path: String,
        destination: String,
    },
}

/// An expectation about the target did not hold. These are the test
/// failures proper.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionError {
    #[error("Package '{package}' is not installed")]
    PackageNotInstalled { package: String },
    #[error("Package '{package}' is unexpectedly installed")]
    PackageInstalled { package: String },
    #[error("Expected output '{expected}' was not found")]
    OutputMissing { expected: String },
    #[error("Unexpected output '{unexpected}' was found")]
    UnexpectedOutput { unexpected: String },
    #[error("Expected exit code {expected}, got {actual:?}")]
    ExitCode { expected: i32, actual: Option<i32> },
    #[error("Check '{check}' failed for '{path}'")]
    FileCheck { path: String, check: String },
    #[error("Contents of '{path}' do not match")]
    FileContents { path: String },
    #[error("None of the expected lines appeared within {timeout_secs} seconds")]
    OutputTimeout { timeout_secs: u64 },
    #[error("Package version '{deb_version}' does not match '{version}'")]
    VersionMismatch {
        version: String,
        deb_version: String,
    },
    #[error("Assertion failed: {0}")]
    Failed(String),
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Scenario panicked: {0}")]
    Panic(String),
    #[error("Failed to serialize report")]
    SerializeReport,
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories separate problems of the test infrastructure from actual
/// failures of the packages under test.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The harness failed to initialize.
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// The harness was given invalid input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// A container or emulated device could not be brought up or down.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// A command could not be executed or exited unsuccessfully.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// An expectation about the packages under test did not hold.
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// A bug in the harness.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct HarnessErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct HarnessError(Box<HarnessErrorInner>);
impl HarnessError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        HarnessError(Box::new(HarnessErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        HarnessError(Box::new(HarnessErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(message: &'static str) -> Self {
        Self::new(InternalError::Internal(message))
    }

    /// Shorthand for a generic assertion failure.
    #[track_caller]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(AssertionError::Failed(message.into()))
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    /// Whether this error is a failed expectation rather than a problem of
    /// the harness or its infrastructure.
    pub fn is_assertion(&self) -> bool {
        matches!(self.0.kind, ErrorKind::Assertion(_))
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured HarnessError.
    fn structured(self, kind: K) -> Result<T, HarnessError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, HarnessError> {
        match self {
            Some(t) => Ok(t),
            None => Err(HarnessError::new(kind)),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, HarnessError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(HarnessError::with_source(kind, e.into())),
        }
    }
}

pub trait HarnessResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, HarnessError>;

    /// Convert the error into an unstructured error.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}

impl<T> HarnessResultExt<T> for Result<T, HarnessError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, HarnessError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for HarnessError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("harness-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Initialization(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Provisioning(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Execution(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Assertion(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

/// Fail with an `AssertionError::Failed` unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::assertion(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn test_error_serialize() {
        let e = HarnessError(Box::new(HarnessErrorInner {
            kind: ErrorKind::Initialization(InitializationError::ParseConfig),
            location: Location::caller(),
            source: Some(
                std::fs::read("/non-existant-file")
                    .context("failed to read file")
                    .unwrap_err(),
            ),
            context: Vec::new(),
        }));
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m.len(), 5);
                assert_eq!(m["error"], Value::String("parse-config".into()));
                assert_eq!(m["category"], Value::String("initialization".into()));
                assert!(matches!(m["cause"], Value::String(_)));
                assert_eq!(
                    m["message"],
                    Value::String("Failed to parse configuration".into())
                );
                match m["location"] {
                    Value::String(ref s) => assert!(s.contains("error.rs:")),
                    _ => panic!("location isn't string"),
                }
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_debug() {
        let error = Err::<(), _>(anyhow::anyhow!("z"))
            .context("x\ny")
            .structured(InternalError::Internal("w"))
            .unwrap_err();
        assert_eq!(
            format!("{:?}", error),
            format!(
                "Internal error: w at {}:{}\n\nCaused by:\n    0: x\n       y\n    1: z\n",
                error.0.location.file(),
                error.0.location.line(),
            ),
        );
    }

    #[test]
    fn test_message_context() {
        let error = Err::<(), _>(HarnessError::new(AssertionError::PackageNotInstalled {
            package: "mender-client".into(),
        }))
        .message("Checking meta package")
        .unwrap_err();

        assert!(error.is_assertion());
        let rendered = format!("{error:?}");
        assert!(rendered.starts_with("Package 'mender-client' is not installed at "));
        assert!(rendered.contains("Context:\n    0: Checking meta package at "));
    }

    #[test]
    fn test_ensure() {
        fn check(value: u32) -> Result<(), HarnessError> {
            ensure!(value == 3, "expected 3, got {value}");
            Ok(())
        }

        check(3).unwrap();
        let error = check(4).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Assertion(AssertionError::Failed("expected 3, got 4".into()))
        );
    }

    #[test]
    fn test_option_structured() {
        let error = None::<u32>
            .structured(InvalidInputError::UnknownSuite {
                name: "nope".into(),
            })
            .unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "invalid-input");
        assert!(!error.is_assertion());
    }
}
