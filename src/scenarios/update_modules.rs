//! Container update modules on top of a configured client.

use harness_api::{constants::UPDATE_MODULES_DIR, error::HarnessError};
use osutils::{apt::Apt, files::FileExpectation};

use crate::{
    assertions::{check_installed, verify_files},
    provision::EnvironmentKind,
};

use super::{upload, Scenario, ScenarioContext, Scope, Suite};

fn docker_compose(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let package = upload(ctx, "mender-docker-compose")?;

    // Docker itself comes from the distribution
    conn.sudo(
        &Apt::install([Apt::local(&package.filename)])
            .fix_broken()
            .to_string(),
    )?;

    check_installed(conn, package.name(), true)?;
    verify_files(
        conn,
        &[FileExpectation::executable(format!(
            "{UPDATE_MODULES_DIR}/docker-compose"
        ))],
    )
}

const SCENARIOS: &[Scenario] = &[Scenario::new("docker-compose", docker_compose)];

inventory::submit! {
    Suite {
        name: "update-modules",
        description: "Container update modules",
        environment: EnvironmentKind::RaspbianConfigured,
        scope: Scope::PerSuite,
        markers: &[],
        order: 52,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}
