//! The commercial orchestrator packages: the split core, support and demo
//! packages, the meta package pulling them in, and the core on its own.
//!
//! Every scenario purges what it installed, whatever its outcome, as the
//! environment is shared with the scenarios that follow.

use log::warn;

use harness_api::{
    constants::{INVENTORY_DIR, UPDATE_MODULES_DIR},
    error::HarnessError,
};
use osutils::{apt::Apt, connection::Connection, dpkg::Dpkg, files::FileExpectation};

use crate::{
    apt_repo,
    assertions::{check_all_installed, check_installed, verify_files},
    packages::BuiltPackage,
    provision::EnvironmentKind,
};

use super::{upload, Marker, Scenario, ScenarioContext, Scope, Suite};

const ORCHESTRATOR_DATA_DIR: &str = "/data/mender-orchestrator";
const PACKAGES_DIR: &str = "/packages";

/// Purge `packages` without failing, logging what went wrong.
fn purge_quietly(conn: &dyn Connection, packages: &[&str]) {
    match conn.sudo_warn(&Dpkg::purge(packages.iter().copied()).to_string()) {
        Ok(result) if !result.success() => {
            warn!("Failed to purge {packages:?}: {}", result.explain_exit())
        }
        Ok(_) => (),
        Err(e) => warn!("Failed to purge {packages:?}: {e:?}"),
    }
}

/// Run `body`, then purge `packages` whatever the outcome.
fn with_cleanup<F>(ctx: &ScenarioContext, packages: &[&str], body: F) -> Result<(), HarnessError>
where
    F: FnOnce(&dyn Connection) -> Result<(), HarnessError>,
{
    let conn = ctx.conn()?;
    let result = body(conn);
    purge_quietly(conn, packages);
    result
}

/// The core package shares the version of the orchestrator meta package.
fn upload_core(ctx: &ScenarioContext) -> Result<BuiltPackage, HarnessError> {
    let conn = ctx.conn()?;
    let core = BuiltPackage::resolve_as(
        ctx.config,
        ctx.platform,
        "mender-orchestrator-core",
        "mender-orchestrator",
    )?;
    core.upload(conn)?;
    Ok(core)
}

fn dpkg_install_file(conn: &dyn Connection, package: &BuiltPackage) -> Result<(), HarnessError> {
    conn.sudo(&Dpkg::install([package.filename.as_str()]).to_string())?;
    Ok(())
}

fn split(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    with_cleanup(
        ctx,
        &[
            "mender-orchestrator-demo",
            "mender-orchestrator-support",
            "mender-orchestrator-core",
        ],
        |conn| {
            let core = upload_core(ctx)?;
            dpkg_install_file(conn, &core)?;

            let support = upload(ctx, "mender-orchestrator-support")?;
            dpkg_install_file(conn, &support)?;
            check_installed(conn, support.name(), true)?;
            verify_files(
                conn,
                &[
                    FileExpectation::executable(format!(
                        "{INVENTORY_DIR}/mender-inventory-orchestrator-inventory"
                    )),
                    FileExpectation::executable(format!(
                        "{UPDATE_MODULES_DIR}/mender-orchestrator-manifest"
                    )),
                    FileExpectation::executable(
                        "/usr/share/mender-orchestrator/interfaces/v1/rootfs-image",
                    ),
                ],
            )?;

            let demo = upload(ctx, "mender-orchestrator-demo")?;
            dpkg_install_file(conn, &demo)?;
            check_installed(conn, demo.name(), true)?;

            let mut expectations = vec![FileExpectation::file(format!(
                "{ORCHESTRATOR_DATA_DIR}/topology.yaml"
            ))];
            expectations.extend((0..3).map(|i| {
                FileExpectation::directory(format!("{ORCHESTRATOR_DATA_DIR}/mock-instances/{i}"))
            }));
            verify_files(conn, &expectations)
        },
    )
}

fn meta(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    with_cleanup(
        ctx,
        &[
            "mender-orchestrator-support",
            "mender-orchestrator-core",
            "mender-orchestrator",
        ],
        |conn| {
            upload(ctx, "mender-orchestrator")?;
            upload_core(ctx)?;
            upload(ctx, "mender-orchestrator-support")?;
            upload(ctx, "mender-orchestrator-demo")?;

            conn.sudo(&format!("mkdir -p {PACKAGES_DIR} && mv *.deb {PACKAGES_DIR}/"))?;
            apt_repo::prepare_local_apt_repo(conn, PACKAGES_DIR)?;

            // Only the meta package, its dependencies follow
            conn.sudo(&Apt::install(["mender-orchestrator"]).to_string())?;

            check_all_installed(
                conn,
                &[
                    "mender-orchestrator",
                    "mender-orchestrator-core",
                    "mender-orchestrator-support",
                ],
                true,
            )?;
            check_installed(conn, "mender-orchestrator-demo", false)
        },
    )
}

/// The core needs only the authentication daemon, not the update one.
fn standalone(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    with_cleanup(ctx, &["mender-orchestrator-core"], |conn| {
        conn.sudo(
            &Dpkg::purge(["mender-update", "mender-configure", "mender-connect"]).to_string(),
        )?;

        let core = upload_core(ctx)?;
        conn.sudo(&Apt::install([Apt::local(&core.filename)]).to_string())?;

        check_installed(conn, core.name(), true)?;
        verify_files(
            conn,
            &[FileExpectation::executable("/usr/bin/mender-orchestrator")],
        )
    })
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("split", split),
    Scenario::new("meta-package", meta),
    Scenario::new("standalone", standalone),
];

inventory::submit! {
    Suite {
        name: "orchestrator",
        description: "Commercial orchestrator packages",
        environment: EnvironmentKind::RaspbianConfigured,
        scope: Scope::PerScenario,
        markers: &[Marker::Commercial],
        // Removing mender-update makes later installs refuse to downgrade
        order: 100,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}
