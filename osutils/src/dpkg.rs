//! `dpkg` command lines and output parsing.

use std::fmt::{self, Display};

use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use harness_api::constants::{DPKG_STATUS_INSTALLED, NONINTERACTIVE_FRONTEND};

/// Package state as reported by `dpkg --status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub package: String,
    pub want: String,
    pub flag: String,
    pub state: String,
    pub version: Option<String>,
}

impl PackageStatus {
    /// Parse the control paragraph printed by `dpkg --status`. Returns `None`
    /// when there is no package or status field, e.g. for unknown packages.
    pub fn parse(output: &str) -> Option<Self> {
        let mut package = None;
        let mut status = None;
        let mut version = None;

        for line in output.lines() {
            if let Some((key, value)) = line.split_once(':') {
                match key {
                    "Package" => package = Some(value.trim().to_string()),
                    "Status" => status = Some(value.trim().to_string()),
                    "Version" => version = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        let status = status?;
        let mut triple = status.split_whitespace();
        Some(Self {
            package: package?,
            want: triple.next()?.to_string(),
            flag: triple.next()?.to_string(),
            state: triple.next()?.to_string(),
            version,
        })
    }

    /// The `want flag state` triple.
    pub fn status(&self) -> String {
        format!("{} {} {}", self.want, self.flag, self.state)
    }

    /// Fully installed. Removed packages whose configuration files are still
    /// around are not.
    pub fn is_installed(&self) -> bool {
        self.status() == DPKG_STATUS_INSTALLED
    }
}

/// Lines printed by dpkg while it processes a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum Progress {
    #[strum(serialize = "Unpacking")]
    Unpacking,
    #[strum(serialize = "Setting up")]
    SettingUp,
    #[strum(serialize = "Removing")]
    Removing,
    #[strum(serialize = "Purging configuration files for")]
    Purging,
}

impl Progress {
    /// E.g. `Setting up mender-connect (2.2.0-1)`.
    pub fn line(&self, package: &str, version: &str) -> String {
        format!("{self} {package} ({version})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DpkgAction {
    Install,
    Remove,
    Purge,
    Status,
}

/// A `dpkg` command line, without privilege escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dpkg {
    action: DpkgAction,
    targets: Vec<String>,
    ignore_depends: Vec<String>,
    noninteractive: bool,
}

impl Dpkg {
    fn new<I, S>(action: DpkgAction, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action,
            targets: targets.into_iter().map(Into::into).collect(),
            ignore_depends: Vec::new(),
            noninteractive: false,
        }
    }

    /// Install package files.
    pub fn install<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(DpkgAction::Install, files)
    }

    pub fn remove<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(DpkgAction::Remove, packages)
    }

    pub fn purge<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(DpkgAction::Purge, packages)
    }

    pub fn status(package: &str) -> Self {
        Self::new(DpkgAction::Status, [package])
    }

    /// Install even though `package` is missing.
    pub fn ignore_depends(mut self, package: &str) -> Self {
        self.ignore_depends.push(package.into());
        self
    }

    pub fn noninteractive(mut self) -> Self {
        self.noninteractive = true;
        self
    }
}

impl Display for Dpkg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.noninteractive {
            write!(f, "{NONINTERACTIVE_FRONTEND} ")?;
        }
        write!(f, "dpkg --{}", <&str>::from(self.action))?;
        if !self.ignore_depends.is_empty() {
            write!(f, " --ignore-depends={}", self.ignore_depends.join(","))?;
        }
        for target in &self.targets {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}
