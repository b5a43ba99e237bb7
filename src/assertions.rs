//! Checks of the target state after an operation.
//!
//! Every check returns an `AssertionError` describing what did not hold, so
//! the runner can tell failing packages apart from a broken environment.

use std::time::Duration;

use log::{debug, trace};

use harness_api::{
    constants::DPKG_STATUS_INSTALLED,
    error::{AssertionError, HarnessError, HarnessResultExt},
};
use osutils::{
    connection::{CommandResult, Connection},
    dpkg::{Dpkg, Progress},
    files::FileExpectation,
};

use crate::polling;

/// Check whether `package` is installed in the target.
///
/// Only the `install ok installed` status counts as installed: a package that
/// was removed but not purged (`deinstall ok config-files`) does not.
pub fn check_installed(
    conn: &dyn Connection,
    package: &str,
    installed: bool,
) -> Result<(), HarnessError> {
    let result = conn.run_warn(&Dpkg::status(package).to_string())?;
    let status_line = format!("Status: {DPKG_STATUS_INSTALLED}");
    let is_installed = result.success() && result.stdout.contains(&status_line);

    match (installed, is_installed) {
        (true, false) => Err(HarnessError::new(AssertionError::PackageNotInstalled {
            package: package.into(),
        })),
        (false, true) => Err(HarnessError::new(AssertionError::PackageInstalled {
            package: package.into(),
        })),
        _ => {
            trace!(
                "Package '{package}' is {}installed, as expected",
                if installed { "" } else { "not " }
            );
            Ok(())
        }
    }
}

/// Check the installation status of several packages at once.
pub fn check_all_installed(
    conn: &dyn Connection,
    packages: &[&str],
    installed: bool,
) -> Result<(), HarnessError> {
    for package in packages {
        check_installed(conn, package, installed)?;
    }
    Ok(())
}

/// Fail unless the standard output of `result` contains `needle`.
#[track_caller]
pub fn assert_output_contains(result: &CommandResult, needle: &str) -> Result<(), HarnessError> {
    if result.stdout.contains(needle) {
        return Ok(());
    }

    Err(HarnessError::with_source(
        AssertionError::OutputMissing {
            expected: needle.into(),
        },
        anyhow::anyhow!("stdout:\n{}", result.stdout),
    ))
}

/// Fail if the standard output of `result` contains `needle`.
#[track_caller]
pub fn assert_output_lacks(result: &CommandResult, needle: &str) -> Result<(), HarnessError> {
    if !result.stdout.contains(needle) {
        return Ok(());
    }

    Err(HarnessError::new(AssertionError::UnexpectedOutput {
        unexpected: needle.into(),
    }))
}

#[track_caller]
pub fn assert_exit_code(result: &CommandResult, expected: i32) -> Result<(), HarnessError> {
    if result.exit_code == Some(expected) {
        return Ok(());
    }

    Err(HarnessError::new(AssertionError::ExitCode {
        expected,
        actual: result.exit_code,
    }))
}

/// Fail unless dpkg reported each of `steps` for `package` at `version`.
pub fn assert_dpkg_progress(
    result: &CommandResult,
    steps: &[Progress],
    package: &str,
    version: &str,
) -> Result<(), HarnessError> {
    for step in steps {
        assert_output_contains(result, &step.line(package, version))?;
    }
    Ok(())
}

/// The usual progress of a package install.
pub const INSTALL_PROGRESS: &[Progress] = &[Progress::Unpacking, Progress::SettingUp];

/// Check every expectation, in order. Stops at the first one that does not
/// hold.
pub fn verify_files(
    conn: &dyn Connection,
    expectations: &[FileExpectation],
) -> Result<(), HarnessError> {
    for expectation in expectations {
        verify_file(conn, expectation)?;
    }
    Ok(())
}

fn verify_file(conn: &dyn Connection, expectation: &FileExpectation) -> Result<(), HarnessError> {
    let result = conn.run_warn(&expectation.test_command())?;
    if !result.success() {
        return Err(HarnessError::new(AssertionError::FileCheck {
            path: expectation.path.clone(),
            check: expectation.to_string(),
        }));
    }

    if let Some(command) = expectation.contents_command() {
        let result = conn
            .run(&command)
            .message(format!("Failed to read '{}'", expectation.path))?;
        if !expectation.contents_match(&result.stdout) {
            return Err(HarnessError::with_source(
                AssertionError::FileContents {
                    path: expectation.path.clone(),
                },
                anyhow::anyhow!(
                    "expected:\n{}\nactual:\n{}",
                    expectation.contents.as_deref().unwrap_or_default(),
                    result.stdout
                ),
            ));
        }
    }

    Ok(())
}

/// Run `command` as root every `interval` until its output contains one of
/// `needles`, and return the needle found. Fails with the last output once
/// `timeout` has elapsed.
pub fn wait_for_any<'a>(
    conn: &dyn Connection,
    command: &str,
    needles: &[&'a str],
    timeout: Duration,
    interval: Duration,
) -> Result<&'a str, HarnessError> {
    debug!(
        "Waiting up to {}s for '{command}' to print one of {needles:?}",
        timeout.as_secs()
    );

    let mut last_output = String::new();
    let found = polling::wait_until(timeout, interval, || {
        let result = conn.sudo_warn(command)?;
        let found = needles.iter().find(|n| result.stdout.contains(**n)).copied();
        last_output = result.stdout;
        Ok(found)
    })?;

    found.ok_or_else(|| {
        HarnessError::with_source(
            AssertionError::OutputTimeout {
                timeout_secs: timeout.as_secs(),
            },
            anyhow::anyhow!("expected one of {needles:?}, last output:\n{last_output}"),
        )
    })
}
