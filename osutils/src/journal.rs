//! systemd unit control and journal reads in the target.

use std::fmt::{self, Display};

use strum_macros::IntoStaticStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SystemctlAction {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
    IsActive,
}

/// `systemctl <action> <unit>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Systemctl {
    action: SystemctlAction,
    unit: String,
}

impl Systemctl {
    pub fn new(action: SystemctlAction, unit: impl Into<String>) -> Self {
        Self {
            action,
            unit: unit.into(),
        }
    }

    pub fn enable(unit: impl Into<String>) -> Self {
        Self::new(SystemctlAction::Enable, unit)
    }

    pub fn start(unit: impl Into<String>) -> Self {
        Self::new(SystemctlAction::Start, unit)
    }

    pub fn stop(unit: impl Into<String>) -> Self {
        Self::new(SystemctlAction::Stop, unit)
    }
}

impl Display for Systemctl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "systemctl {} {}", <&str>::from(self.action), self.unit)
    }
}

/// Command printing the whole journal of `unit`.
pub fn journal_command(unit: &str) -> String {
    format!("journalctl -u {unit} --no-pager")
}
