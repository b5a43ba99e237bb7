//! Built package files and their upload into the target.

use std::path::PathBuf;

use log::debug;

use harness_api::{
    config::TestConfig,
    error::{HarnessError, HarnessResultExt, InvalidInputError},
};
use osutils::connection::Connection;
use sysdefs::{arch::DebianArchitecture, distro::TargetPlatform};

use crate::catalog::{self, PackageInfo};

/// File name of a built package, e.g. `mender-connect_2.2.0-1_armhf.deb`.
pub fn package_filename(version: &str, name: &str, arch: DebianArchitecture) -> String {
    format!("{name}_{version}_{arch}.deb")
}

/// A package file of the build output, resolved for a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPackage {
    pub info: &'static PackageInfo,
    pub version: String,
    pub architecture: DebianArchitecture,
    pub filename: String,

    /// Location on the host.
    pub path: PathBuf,
}

impl BuiltPackage {
    /// Resolve package `name` at its configured version.
    pub fn resolve(
        config: &TestConfig,
        platform: &TargetPlatform,
        name: &str,
    ) -> Result<Self, HarnessError> {
        let info = catalog::lookup(name)?;
        let version = config.package_version(info.version_key)?;
        Ok(Self::at_version(config, platform, info, version))
    }

    /// Resolve package `name` at the version of another package of the same
    /// source, e.g. the orchestrator core at the orchestrator version.
    pub fn resolve_as(
        config: &TestConfig,
        platform: &TargetPlatform,
        name: &str,
        version_of: &str,
    ) -> Result<Self, HarnessError> {
        let info = catalog::lookup(name)?;
        let version = config.package_version(catalog::lookup(version_of)?.version_key)?;
        Ok(Self::at_version(config, platform, info, version))
    }

    fn at_version(
        config: &TestConfig,
        platform: &TargetPlatform,
        info: &'static PackageInfo,
        version: &str,
    ) -> Self {
        let architecture = info.architecture(platform);
        let filename = package_filename(version, info.name, architecture);
        let path = config
            .packages_dir
            .join(info.edition.directory())
            .join(platform.directory_name())
            .join(&filename);

        Self {
            info,
            version: version.into(),
            architecture,
            filename,
            path,
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Copy the package file into the default working directory of the
    /// target, where it can be installed by its file name.
    pub fn upload(&self, conn: &dyn Connection) -> Result<(), HarnessError> {
        if !self.path.is_file() {
            return Err(HarnessError::new(InvalidInputError::MissingBuiltPackage {
                path: self.path.display().to_string(),
            }));
        }

        debug!("Uploading '{}' to {}", self.filename, conn.describe());
        conn.put(&self.path, None)
            .message(format!("Failed to upload '{}'", self.filename))
    }
}

/// Resolve package `name` and copy it into the target.
pub fn upload_deb_package(
    conn: &dyn Connection,
    config: &TestConfig,
    platform: &TargetPlatform,
    name: &str,
) -> Result<BuiltPackage, HarnessError> {
    let package = BuiltPackage::resolve(config, platform, name)?;
    package.upload(conn)?;
    Ok(package)
}
