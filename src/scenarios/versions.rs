//! Consistency of the Debian package versions with the upstream versions
//! they were built from. Needs no environment.

use log::info;

use harness_api::{
    config::TestConfig,
    error::{HarnessError, InvalidInputError},
    version::verify_package_version,
};

use crate::provision::EnvironmentKind;

use super::{Scenario, ScenarioContext, Scope, Suite};

/// Packages whose version follows an upstream version, with a getter of the
/// configured upstream version.
const COMPONENTS: &[(&str, fn(&TestConfig) -> Option<&str>)] = &[
    ("mender-client", |c| c.versions.mender_client.as_deref()),
    ("mender-connect", |c| c.versions.mender_connect.as_deref()),
    ("mender-configure", |c| c.versions.mender_configure.as_deref()),
];

/// Verify the package version of `name` against its upstream version. Does
/// nothing when no upstream version is configured.
pub fn check_version(config: &TestConfig, name: &str) -> Result<(), HarnessError> {
    let Some((_, upstream)) = COMPONENTS.iter().find(|(n, _)| *n == name) else {
        return Err(HarnessError::new(InvalidInputError::UnknownPackage {
            name: name.into(),
        }));
    };

    match upstream(config) {
        Some(version) => {
            let deb_version = config.package_version(name)?;
            verify_package_version(version, deb_version)?;
            info!("Package version '{deb_version}' of '{name}' matches '{version}'");
            Ok(())
        }
        None => {
            info!("No upstream version configured for '{name}', not checking it");
            Ok(())
        }
    }
}

/// Verify every component, stopping at the first mismatch.
pub fn check_versions(config: &TestConfig) -> Result<(), HarnessError> {
    for (name, _) in COMPONENTS {
        check_version(config, name)?;
    }
    Ok(())
}

fn client(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    check_version(ctx.config, "mender-client")
}

fn connect(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    check_version(ctx.config, "mender-connect")
}

fn configure(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    check_version(ctx.config, "mender-configure")
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("mender-client", client),
    Scenario::new("mender-connect", connect),
    Scenario::new("mender-configure", configure),
];

inventory::submit! {
    Suite {
        name: "versions",
        description: "Package versions against the upstream versions",
        environment: EnvironmentKind::Host,
        scope: Scope::PerSuite,
        markers: &[],
        order: 0,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}
