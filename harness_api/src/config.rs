use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sysdefs::{
    arch::DebianArchitecture,
    distro::{Distribution, TargetPlatform},
};

use crate::{
    constants,
    error::{HarnessError, InitializationError, InvalidInputError, ReportError},
};

/// Full configuration of a test run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TestConfig {
    /// Upstream versions of the components the packages were built from.
    pub versions: ComponentVersions,

    /// Debian version of each built package, keyed by package name. Some
    /// packages share the version of another one, see the package catalog.
    pub package_versions: BTreeMap<String, String>,

    /// Run the suites that need commercial packages.
    pub commercial_tests: bool,

    /// Directory holding the built packages, laid out as
    /// `{opensource|commercial}/{distro}-{release}-{arch}/*.deb`.
    pub packages_dir: PathBuf,

    /// Directory served by the script server. Must contain the installer script.
    pub script_dir: PathBuf,

    pub script_server: ScriptServerConfig,

    /// Platform of the generic containers and of the packages installed in
    /// them. This is the reference platform the installer script is tested on.
    pub platform: TargetPlatform,

    /// Docker image of the generic containers. `{release}` is replaced by the
    /// platform release.
    pub generic_image: String,

    pub device: DeviceConfig,

    pub timeouts: Timeouts,

    /// JSON-lines log of every record of the run. Overridden by `--log-file`.
    pub run_log: Option<PathBuf>,

    /// JSON-lines file receiving one record per scenario result as soon as it
    /// is known. Overridden by `--trace-file`.
    pub result_trace: Option<PathBuf>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            versions: ComponentVersions::default(),
            package_versions: BTreeMap::new(),
            commercial_tests: false,
            packages_dir: constants::PACKAGES_DIR_DEFAULT.into(),
            script_dir: ".".into(),
            script_server: ScriptServerConfig::default(),
            platform: TargetPlatform::new(
                Distribution::Debian,
                constants::DEBIAN_REF_DISTRO,
                DebianArchitecture::Amd64,
            ),
            generic_image: "debian:{release}".into(),
            device: DeviceConfig::default(),
            timeouts: Timeouts::default(),
            run_log: None,
            result_trace: None,
        }
    }
}

/// Upstream component versions, either a release number or `master`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ComponentVersions {
    pub mender_client: Option<String>,
    pub mender_connect: Option<String>,
    pub mender_configure: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ScriptServerConfig {
    /// Address to bind to.
    pub bind_address: String,

    /// Address the provisioned environments use to reach the server.
    pub client_address: String,

    pub port: u16,
}

impl Default for ScriptServerConfig {
    fn default() -> Self {
        Self {
            bind_address: constants::SCRIPT_SERVER_BIND_ADDRESS.into(),
            client_address: constants::SCRIPT_SERVER_CLIENT_ADDRESS.into(),
            port: constants::SCRIPT_SERVER_PORT,
        }
    }
}

/// Emulated Raspberry Pi device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub image: String,

    /// Line printed on the serial console once the board is up.
    pub boot_banner: String,

    pub ssh_host: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_key: PathBuf,

    /// Hostname reported by `uname -a`.
    pub hostname: String,

    /// Platform of the packages installed on the device.
    pub platform: TargetPlatform,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            image: constants::RASPBIAN_IMAGE_DEFAULT.into(),
            boot_banner: constants::RASPBIAN_BOOT_BANNER.into(),
            ssh_host: "localhost".into(),
            ssh_user: constants::RASPBIAN_SSH_USER.into(),
            ssh_port: constants::RASPBIAN_SSH_PORT,
            ssh_key: constants::RASPBIAN_SSH_KEY.into(),
            hostname: constants::RASPBIAN_HOSTNAME.into(),
            platform: TargetPlatform::new(
                Distribution::Raspios,
                constants::DEBIAN_REF_DISTRO,
                DebianArchitecture::Armhf,
            ),
        }
    }
}

/// Timeouts of the polling loops, in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Timeouts {
    pub boot: u64,
    pub boot_poll: u64,
    pub ssh_login: u64,
    pub ssh_login_poll: u64,
    pub client_cycle: u64,
    pub client_cycle_poll: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            boot: constants::BOOT_TIMEOUT.as_secs(),
            boot_poll: constants::BOOT_POLL_INTERVAL.as_secs(),
            ssh_login: constants::SSH_LOGIN_TIMEOUT.as_secs(),
            ssh_login_poll: constants::SSH_LOGIN_INTERVAL.as_secs(),
            client_cycle: constants::CLIENT_CYCLE_TIMEOUT.as_secs(),
            client_cycle_poll: constants::CLIENT_CYCLE_POLL_INTERVAL.as_secs(),
        }
    }
}

impl Timeouts {
    pub fn boot(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.boot),
            Duration::from_secs(self.boot_poll),
        )
    }

    pub fn ssh_login(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.ssh_login),
            Duration::from_secs(self.ssh_login_poll),
        )
    }

    pub fn client_cycle(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.client_cycle),
            Duration::from_secs(self.client_cycle_poll),
        )
    }
}

impl TestConfig {
    /// Load a configuration file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).structured(InitializationError::LoadConfig {
                path: path.display().to_string(),
            })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, HarnessError> {
        serde_yaml::from_str(contents).structured(InitializationError::ParseConfig)
    }

    /// Apply the environment variables selecting the platform of the packages
    /// installed on the emulated device. `lookup` is normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(release) = lookup(constants::DEBIAN_VERSION_NAME_ENV) {
            self.device.platform.release = release;
        }

        if let Some(value) = lookup(constants::DEBIAN_DISTRO_NAME_ENV) {
            self.device.platform.distribution =
                value
                    .parse()
                    .ok()
                    .structured(InvalidInputError::InvalidEnvironmentVariable {
                        variable: constants::DEBIAN_DISTRO_NAME_ENV.into(),
                        value: value.clone(),
                    })?;
        }

        if let Some(value) = lookup(constants::DEBIAN_ARCH_ENV) {
            self.device.platform.architecture =
                value
                    .parse()
                    .ok()
                    .structured(InvalidInputError::InvalidEnvironmentVariable {
                        variable: constants::DEBIAN_ARCH_ENV.into(),
                        value: value.clone(),
                    })?;
        }

        Ok(())
    }

    /// Apply a `NAME=VERSION` package version override.
    pub fn add_package_version(&mut self, entry: &str) -> Result<(), HarnessError> {
        match entry.split_once('=') {
            Some((name, version)) if !name.trim().is_empty() && !version.trim().is_empty() => {
                self.package_versions
                    .insert(name.trim().into(), version.trim().into());
                Ok(())
            }
            _ => Err(HarnessError::new(
                InvalidInputError::InvalidVersionOverride { value: entry.into() },
            )),
        }
    }

    /// Debian version configured under `key`.
    pub fn package_version(&self, key: &str) -> Result<&str, HarnessError> {
        self.package_versions
            .get(key)
            .map(String::as_str)
            .structured(InvalidInputError::MissingVersion { key: key.into() })
    }

    /// Docker image of the generic containers.
    pub fn generic_image(&self) -> String {
        self.generic_image
            .replace("{release}", &self.platform.release)
    }
}
