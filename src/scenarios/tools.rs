//! Host tools shipped as packages.

use harness_api::error::HarnessError;
use osutils::{dpkg::Dpkg, files::FileExpectation};

use crate::{
    assertions::{check_installed, verify_files},
    provision::EnvironmentKind,
};

use super::{upload, Scenario, ScenarioContext, Scope, Suite};

fn mender_artifact(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let package = upload(ctx, "mender-artifact")?;
    conn.sudo(&Dpkg::install([package.filename.as_str()]).to_string())?;

    check_installed(conn, package.name(), true)?;
    verify_files(conn, &[FileExpectation::executable("/usr/bin/mender-artifact")])?;
    conn.run("mender-artifact --version")?;
    Ok(())
}

const SCENARIOS: &[Scenario] = &[Scenario::new("mender-artifact", mender_artifact)];

inventory::submit! {
    Suite {
        name: "tools",
        description: "mender-artifact",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerSuite,
        markers: &[],
        order: 80,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}
