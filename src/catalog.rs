//! What the harness knows about each package it tests.

use strum_macros::{Display, IntoStaticStr};

use harness_api::{
    constants::{COMMERCIAL_PACKAGES_DIR, OPENSOURCE_PACKAGES_DIR},
    error::{HarnessError, InvalidInputError},
};
use sysdefs::{arch::DebianArchitecture, distro::TargetPlatform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Edition {
    Opensource,
    Commercial,
}

impl Edition {
    /// Sub-directory of the packages directory holding this edition.
    pub fn directory(&self) -> &'static str {
        match self {
            Edition::Opensource => OPENSOURCE_PACKAGES_DIR,
            Edition::Commercial => COMMERCIAL_PACKAGES_DIR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchKind {
    /// Built for each architecture.
    Native,
    /// Built once, as `all`.
    Independent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: &'static str,
    pub edition: Edition,
    pub arch: ArchKind,

    /// Key of the configured package versions holding the version of this
    /// package. Packages built from the same source share a key.
    pub version_key: &'static str,
}

impl PackageInfo {
    const fn new(
        name: &'static str,
        edition: Edition,
        arch: ArchKind,
        version_key: &'static str,
    ) -> Self {
        Self {
            name,
            edition,
            arch,
            version_key,
        }
    }

    /// Architecture of the package file built for `platform`.
    pub fn architecture(&self, platform: &TargetPlatform) -> DebianArchitecture {
        match self.arch {
            ArchKind::Native => platform.architecture,
            ArchKind::Independent => DebianArchitecture::All,
        }
    }
}

use ArchKind::{Independent, Native};
use Edition::{Commercial, Opensource};

const CATALOG: &[PackageInfo] = &[
    // Client
    PackageInfo::new("mender-client", Opensource, Native, "mender-client"),
    PackageInfo::new("mender-client4", Opensource, Native, "mender-client"),
    PackageInfo::new("mender-auth", Opensource, Native, "mender-client"),
    PackageInfo::new("mender-update", Opensource, Native, "mender-client"),
    PackageInfo::new("mender-client-dev", Opensource, Independent, "mender-client"),
    // Add-ons and companions
    PackageInfo::new("mender-connect", Opensource, Native, "mender-connect"),
    PackageInfo::new("mender-configure", Opensource, Independent, "mender-configure"),
    PackageInfo::new("mender-setup", Opensource, Native, "mender-setup"),
    PackageInfo::new("mender-flash", Opensource, Native, "mender-flash"),
    PackageInfo::new("mender-snapshot", Opensource, Native, "mender-snapshot"),
    PackageInfo::new("mender-artifact", Opensource, Native, "mender-artifact"),
    PackageInfo::new(
        "mender-docker-compose",
        Opensource,
        Independent,
        "mender-container-modules",
    ),
    PackageInfo::new(
        "mender-app-update-module",
        Opensource,
        Independent,
        "mender-app-update-module",
    ),
    PackageInfo::new(
        "mender-client-version-inventory-script",
        Opensource,
        Independent,
        "mender-client-version-inventory-script",
    ),
    // Commercial
    PackageInfo::new("mender-gateway", Commercial, Native, "mender-gateway"),
    PackageInfo::new("mender-orchestrator", Commercial, Native, "mender-orchestrator"),
    PackageInfo::new(
        "mender-orchestrator-core",
        Commercial,
        Native,
        "mender-orchestrator",
    ),
    PackageInfo::new(
        "mender-orchestrator-support",
        Commercial,
        Independent,
        "mender-orchestrator-support",
    ),
    PackageInfo::new(
        "mender-orchestrator-demo",
        Commercial,
        Independent,
        "mender-orchestrator-support",
    ),
];

/// Look up a package by name.
pub fn lookup(name: &str) -> Result<&'static PackageInfo, HarnessError> {
    CATALOG
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| HarnessError::new(InvalidInputError::UnknownPackage { name: name.into() }))
}

/// Every known package.
pub fn packages() -> impl Iterator<Item = &'static PackageInfo> {
    CATALOG.iter()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use sysdefs::distro::Distribution;

    use super::*;

    #[test]
    fn test_lookup() {
        let update = lookup("mender-update").unwrap();
        assert_eq!(update.version_key, "mender-client");
        assert_eq!(update.edition, Edition::Opensource);

        let compose = lookup("mender-docker-compose").unwrap();
        assert_eq!(compose.version_key, "mender-container-modules");

        let demo = lookup("mender-orchestrator-demo").unwrap();
        assert_eq!(demo.edition.directory(), "commercial");
        assert_eq!(demo.version_key, "mender-orchestrator-support");

        let error = lookup("mender-shell").unwrap_err();
        assert_eq!(error.kind().to_string(), "Unknown package 'mender-shell'");
    }

    #[test]
    fn test_architecture() {
        let platform =
            TargetPlatform::new(Distribution::Raspios, "bookworm", DebianArchitecture::Armhf);
        assert_eq!(
            lookup("mender-connect").unwrap().architecture(&platform),
            DebianArchitecture::Armhf
        );
        assert_eq!(
            lookup("mender-configure").unwrap().architecture(&platform),
            DebianArchitecture::All
        );
    }

    #[test]
    fn test_unique_names() {
        let names: HashSet<_> = packages().map(|p| p.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }
}
