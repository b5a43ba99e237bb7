//! The legacy Go client package on the emulated board, following the
//! documented configuration steps.

use harness_api::{
    constants::{CLIENT_CONFIG_FILE, CLIENT_DATA_DIR, DEVICE_TYPE_FILE},
    error::HarnessError,
    version::MASTER_VERSION,
};
use osutils::{
    dpkg::{Dpkg, Progress},
    files::FileExpectation,
    journal::{journal_command, Systemctl},
};

use crate::{
    assertions::{assert_dpkg_progress, assert_output_contains, verify_files, wait_for_any},
    provision::EnvironmentKind,
};

use super::{dpkg_install, upload, Scenario, ScenarioContext, Scope, Suite};

const PACKAGE: &str = "mender-client";
const SERVICE: &str = "mender-client";
const TENANT_TOKEN_PLACEHOLDER: &str = "Paste your Hosted Mender token here";
const REBOOT_UNSUPPORTED: &str = "rebooting the emulated board is not supported";

fn install(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let result = conn.run("uname -a")?;
    assert_output_contains(&result, &ctx.config.device.hostname)?;

    let package = upload(ctx, PACKAGE)?;
    dpkg_install(ctx, &[&package], None)?;

    match ctx.config.versions.mender_client.as_deref() {
        Some(version) if version != MASTER_VERSION => {
            let result = conn.run("mender --version")?;
            assert_output_contains(&result, version)
        }
        _ => Ok(()),
    }
}

fn configure(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    conn.sudo(&format!("cp {CLIENT_CONFIG_FILE}.demo {CLIENT_CONFIG_FILE}"))?;
    conn.sudo(&format!(
        "sed -i 's/{TENANT_TOKEN_PLACEHOLDER}/dummy/' {CLIENT_CONFIG_FILE}"
    ))?;
    conn.sudo(&format!("mkdir -p {CLIENT_DATA_DIR}"))?;
    conn.sudo(&format!("echo device_type=raspberrypi3 > {DEVICE_TYPE_FILE}"))?;

    verify_files(
        conn,
        &[FileExpectation::file(DEVICE_TYPE_FILE).with_contents("device_type=raspberrypi3")],
    )
}

fn start(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    conn.sudo(&Systemctl::enable(SERVICE).to_string())?;
    conn.sudo(&Systemctl::start(SERVICE).to_string())?;

    // Key generation and one retry of the authorization take a while
    let (timeout, interval) = ctx.config.timeouts.client_cycle();
    let journal = journal_command(SERVICE);
    wait_for_any(
        conn,
        &journal,
        &["State transition: authorize [Sync] -> authorize-wait [Idle]"],
        timeout,
        interval,
    )?;

    let result = conn.sudo(&journal)?;
    for line in [
        "Started Mender OTA update service.",
        "Loaded configuration file",
        "No dual rootfs configuration present",
        "authorize failed: transient error: authorization request failed",
    ] {
        assert_output_contains(&result, line)?;
    }
    Ok(())
}

fn stop(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    conn.sudo(&Systemctl::stop(SERVICE).to_string())?;

    let result = conn.sudo(&journal_command(SERVICE))?;
    assert_output_contains(&result, "Stopping Mender OTA update service...")?;
    assert_output_contains(&result, "Stopped Mender OTA update service.")
}

fn remove(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let result = conn.sudo(&Dpkg::remove([PACKAGE]).to_string())?;
    assert_dpkg_progress(
        &result,
        &[Progress::Removing],
        PACKAGE,
        ctx.package_version(PACKAGE)?,
    )?;

    // Configuration and data outlive a remove
    verify_files(
        conn,
        &[
            FileExpectation::not_file("/usr/bin/mender"),
            FileExpectation::absent("/usr/share/mender"),
            FileExpectation::directory("/etc/mender"),
            FileExpectation::directory(CLIENT_DATA_DIR),
        ],
    )
}

fn purge(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let result = conn.sudo(&Dpkg::purge([PACKAGE]).to_string())?;
    assert_dpkg_progress(
        &result,
        &[Progress::Purging],
        PACKAGE,
        ctx.package_version(PACKAGE)?,
    )?;

    // The device type and the systemd links are left behind
    verify_files(
        conn,
        &[
            FileExpectation::not_file("/usr/bin/mender"),
            FileExpectation::absent("/usr/share/mender"),
            FileExpectation::absent("/etc/mender"),
            FileExpectation::directory(CLIENT_DATA_DIR),
            FileExpectation::file(DEVICE_TYPE_FILE),
            FileExpectation::symlink(format!(
                "/etc/systemd/system/multi-user.target.wants/{SERVICE}.service"
            )),
        ],
    )
}

/// Registered as skipped, so the runner never calls it. The board runs in a
/// container that stops with the emulator, so it cannot come back up.
fn reboot(_ctx: &ScenarioContext) -> Result<(), HarnessError> {
    Err(HarnessError::internal(REBOOT_UNSUPPORTED))
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("install", install),
    Scenario::new("configure", configure),
    Scenario::new("start", start),
    Scenario::new("stop", stop),
    Scenario::new("remove", remove),
    Scenario::new("purge", purge),
    Scenario::new("reboot", reboot).skipped(REBOOT_UNSUPPORTED),
];

inventory::submit! {
    Suite {
        name: "client-legacy",
        description: "Legacy client package, configured by hand and run as a service",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerSuite,
        markers: &[],
        order: 41,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}
