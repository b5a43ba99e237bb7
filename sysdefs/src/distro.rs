use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{EnumString, IntoStaticStr};

use crate::arch::DebianArchitecture;

/// Linux distribution the packages are built for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoStaticStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Debian,
    Ubuntu,
    Raspios,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}

/// A distribution release on a given architecture. Built packages for a
/// platform are stored under a directory named after it, for example
/// `debian-bookworm-amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetPlatform {
    pub distribution: Distribution,

    /// Release codename, e.g. `buster` or `bookworm`
    pub release: String,

    pub architecture: DebianArchitecture,
}

impl TargetPlatform {
    pub fn new(
        distribution: Distribution,
        release: impl Into<String>,
        architecture: DebianArchitecture,
    ) -> Self {
        Self {
            distribution,
            release: release.into(),
            architecture,
        }
    }

    /// Name of the directory holding the packages built for this platform
    pub fn directory_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.distribution, self.release, self.architecture
        )
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directory_name())
    }
}
