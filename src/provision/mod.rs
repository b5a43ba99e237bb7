//! Environments the scenarios run in, and their teardown.
//!
//! An [`Environment`] owns the container it started: dropping it stops or
//! removes the container, so teardown happens on every exit path. The
//! container registry of `osutils::container` catches anything left over.

use log::{debug, info, warn};
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};

use harness_api::{
    config::TestConfig,
    error::{ExecutionError, HarnessError, HarnessResultExt, InternalError, ReportError},
};
use osutils::{connection::Connection, container, dependencies::Dependency};
use sysdefs::distro::TargetPlatform;

mod configured;
mod generic;
mod raspbian;

pub use configured::setup_mender_configured;

/// Kind of environment a suite needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentKind {
    /// Plain Debian container of the reference platform, with host networking.
    GenericDebian,

    /// Emulated Raspberry Pi, reached over SSH.
    Raspbian,

    /// Emulated Raspberry Pi with the client installed and configured.
    RaspbianConfigured,

    /// No environment, the scenarios only look at the configuration.
    Host,
}

impl EnvironmentKind {
    /// Host binaries needed to provision this kind of environment.
    fn dependencies(&self) -> &'static [Dependency] {
        match self {
            EnvironmentKind::GenericDebian => &[Dependency::Docker],
            EnvironmentKind::Raspbian | EnvironmentKind::RaspbianConfigured => {
                &[Dependency::Docker, Dependency::Ssh, Dependency::Scp]
            }
            EnvironmentKind::Host => &[],
        }
    }

    /// Platform of the packages installed in this kind of environment.
    pub fn platform<'a>(&self, config: &'a TestConfig) -> &'a TargetPlatform {
        match self {
            EnvironmentKind::GenericDebian | EnvironmentKind::Host => &config.platform,
            EnvironmentKind::Raspbian | EnvironmentKind::RaspbianConfigured => {
                &config.device.platform
            }
        }
    }
}

/// How a container is disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposal {
    /// `docker rm -f`
    Remove,
    /// `docker stop`, the container was started with `--rm`
    Stop,
}

pub struct Environment {
    kind: EnvironmentKind,
    platform: TargetPlatform,
    container: Option<(String, Disposal)>,
    conn: Option<Box<dyn Connection>>,
}

impl Environment {
    /// Bring up an environment of the given kind.
    pub fn provision(kind: EnvironmentKind, config: &TestConfig) -> Result<Self, HarnessError> {
        for dependency in kind.dependencies() {
            if !dependency.exists() {
                return Err(HarnessError::new(ExecutionError::MissingBinary {
                    binary: dependency.name(),
                }));
            }
        }

        info!("Provisioning {kind} environment");
        let platform = kind.platform(config).clone();
        let environment = match kind {
            EnvironmentKind::Host => Ok(Self {
                kind,
                platform,
                container: None,
                conn: None,
            }),
            EnvironmentKind::GenericDebian => generic::provision(config, platform),
            EnvironmentKind::Raspbian => raspbian::provision(config, platform),
            EnvironmentKind::RaspbianConfigured => {
                raspbian::provision(config, platform).and_then(|mut environment| {
                    environment.kind = kind;
                    setup_mender_configured(environment.connection()?, config, &environment.platform)
                        .message("Failed to set up configured client")?;
                    Ok(environment)
                })
            }
        }
        .message(format!("Failed to provision {kind} environment"))?;

        debug!(
            "Provisioned {kind} environment for platform '{}'",
            environment.platform
        );
        Ok(environment)
    }

    fn with_container(
        kind: EnvironmentKind,
        platform: TargetPlatform,
        id: String,
        disposal: Disposal,
    ) -> Self {
        Self {
            kind,
            platform,
            container: Some((id, disposal)),
            conn: None,
        }
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container.as_ref().map(|(id, _)| id.as_str())
    }

    /// Shell of the environment. Host environments have none.
    pub fn connection(&self) -> Result<&dyn Connection, HarnessError> {
        self.conn
            .as_deref()
            .structured(InternalError::Internal("Environment has no connection"))
    }

    /// Tear down the environment, reporting failures.
    pub fn teardown(mut self) -> Result<(), HarnessError> {
        self.dispose()
    }

    fn dispose(&mut self) -> Result<(), HarnessError> {
        // Drop the connection first, nothing may use it past this point
        self.conn = None;

        let Some((id, disposal)) = self.container.take() else {
            return Ok(());
        };

        debug!("Tearing down {} environment '{id}'", self.kind);
        match disposal {
            Disposal::Remove => container::remove(&id),
            Disposal::Stop => container::stop(&id),
        }
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("Failed to tear down {} environment: {e:?}", self.kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use sysdefs::{arch::DebianArchitecture, distro::Distribution};

    use super::*;

    #[test]
    fn test_platform() {
        let mut config = TestConfig::default();
        config.device.platform =
            TargetPlatform::new(Distribution::Raspios, "bookworm", DebianArchitecture::Arm64);

        assert_eq!(
            EnvironmentKind::GenericDebian.platform(&config).directory_name(),
            "debian-buster-amd64"
        );
        assert_eq!(
            EnvironmentKind::RaspbianConfigured
                .platform(&config)
                .directory_name(),
            "raspios-bookworm-arm64"
        );
    }

    #[test]
    fn test_host_environment() {
        let environment =
            Environment::provision(EnvironmentKind::Host, &TestConfig::default()).unwrap();
        assert_eq!(environment.kind(), EnvironmentKind::Host);
        assert_eq!(environment.container_id(), None);
        environment.connection().err().unwrap();
        environment.teardown().unwrap();
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EnvironmentKind::GenericDebian.to_string(), "generic-debian");
        assert_eq!(
            <&str>::from(EnvironmentKind::RaspbianConfigured),
            "raspbian-configured"
        );
    }
}
