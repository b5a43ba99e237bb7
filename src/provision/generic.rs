use harness_api::{
    config::TestConfig,
    error::{HarnessError, ProvisioningError, ReportError},
};
use osutils::{
    apt::Apt,
    connection::{Connection, DockerConnection},
    container::{self, RunOptions},
};
use sysdefs::distro::TargetPlatform;

use super::{Disposal, Environment, EnvironmentKind};

/// Start a plain container of the reference distribution and install what
/// the installer script needs.
pub(super) fn provision(
    config: &TestConfig,
    platform: TargetPlatform,
) -> Result<Environment, HarnessError> {
    let id = container::run(
        &config.generic_image(),
        &RunOptions {
            host_network: true,
            interactive: true,
            auto_remove: true,
        },
    )?;

    // Owned from here on, so that a failed preparation still removes it
    let mut environment = Environment::with_container(
        EnvironmentKind::GenericDebian,
        platform,
        id.clone(),
        Disposal::Remove,
    );

    let conn = DockerConnection::new(id);
    prepare(&conn).structured(ProvisioningError::PrepareEnvironment)?;
    environment.conn = Some(Box::new(conn));
    Ok(environment)
}

fn prepare(conn: &dyn Connection) -> Result<(), anyhow::Error> {
    conn.run(&Apt::update().to_string())
        .map_err(|e| e.unstructured("Failed to update package lists"))?;
    conn.run(&Apt::install(["curl"]).to_string())
        .map_err(|e| e.unstructured("Failed to install curl"))?;
    Ok(())
}
