//! `apt` command lines, without privilege escalation.

use std::fmt::{self, Display};

use strum_macros::IntoStaticStr;

use harness_api::constants::NONINTERACTIVE_FRONTEND;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum AptTool {
    Apt,
    AptGet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum AptAction {
    Update,
    Install,
    Upgrade,
    Remove,
    Purge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apt {
    tool: AptTool,
    action: AptAction,
    targets: Vec<String>,
    noninteractive: bool,
    assume_yes: bool,
    fix_broken: bool,
}

impl Apt {
    fn new(action: AptAction) -> Self {
        Self {
            tool: AptTool::Apt,
            action,
            targets: Vec::new(),
            noninteractive: false,
            assume_yes: false,
            fix_broken: false,
        }
    }

    pub fn update() -> Self {
        Self::new(AptAction::Update)
    }

    /// Upgrade everything. `apt`, unlike `apt-get`, also installs the new
    /// packages pulled in by the upgrade.
    pub fn upgrade() -> Self {
        Self::new(AptAction::Upgrade).assume_yes()
    }

    /// Install packages by name or, see [`Apt::local`], from files.
    pub fn install<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AptAction::Install)
            .assume_yes()
            .with_targets(targets)
    }

    pub fn remove<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AptAction::Remove)
            .assume_yes()
            .with_targets(packages)
    }

    pub fn purge<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AptAction::Purge)
            .assume_yes()
            .with_targets(packages)
    }

    /// Target naming a package file in the working directory. Without the
    /// `./` prefix apt would look the name up in its sources.
    pub fn local(filename: &str) -> String {
        format!("./{filename}")
    }

    fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn apt_get(mut self) -> Self {
        self.tool = AptTool::AptGet;
        self
    }

    pub fn noninteractive(mut self) -> Self {
        self.noninteractive = true;
        self
    }

    pub fn assume_yes(mut self) -> Self {
        self.assume_yes = true;
        self
    }

    /// Let apt pull in the dependencies missing after a partial install.
    pub fn fix_broken(mut self) -> Self {
        self.fix_broken = true;
        self
    }
}

impl Display for Apt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.noninteractive {
            write!(f, "{NONINTERACTIVE_FRONTEND} ")?;
        }
        write!(f, "{}", <&str>::from(self.tool))?;
        if self.assume_yes {
            f.write_str(" --assume-yes")?;
        }
        write!(f, " {}", <&str>::from(self.action))?;
        if self.fix_broken {
            f.write_str(" --fix-broken")?;
        }
        for target in &self.targets {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}
