use std::{fmt, str::FromStr};

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::IntoStaticStr;

/// Debian package architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum DebianArchitecture {
    /// 64-bit x86
    #[strum(serialize = "amd64")]
    Amd64,

    /// 64-bit ARM
    #[strum(serialize = "arm64")]
    Arm64,

    /// 32-bit ARM with hardware floating point, as used by Raspberry Pi OS
    #[strum(serialize = "armhf")]
    Armhf,

    /// Architecture independent packages
    #[strum(serialize = "all")]
    All,
}

impl DebianArchitecture {
    /// Get the architecture of the machine running the harness
    pub const fn current() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            DebianArchitecture::Amd64
        }

        #[cfg(target_arch = "aarch64")]
        {
            DebianArchitecture::Arm64
        }

        #[cfg(target_arch = "arm")]
        {
            DebianArchitecture::Armhf
        }
    }

    /// Debian name of the architecture, as used in package file names
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether packages of this architecture run on any machine
    pub fn is_independent(&self) -> bool {
        matches!(self, DebianArchitecture::All)
    }
}

impl fmt::Display for DebianArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DebianArchitecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match &*s.to_lowercase() {
            "x64" | "amd64" | "x86_64" => DebianArchitecture::Amd64,
            "arm64" | "aarch64" => DebianArchitecture::Arm64,
            "armhf" | "arm" | "armv7" | "armv7l" => DebianArchitecture::Armhf,
            "all" | "noarch" => DebianArchitecture::All,
            arch => return Err(format!("unknown debian architecture '{arch}'")),
        })
    }
}

impl<'de> Deserialize<'de> for DebianArchitecture {
    fn deserialize<D>(deserializer: D) -> Result<DebianArchitecture, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

impl Serialize for DebianArchitecture {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
