//! The installer script on the emulated board, installing the legacy client.

use url::Url;

use harness_api::error::{HarnessError, InternalError, ReportError};
use osutils::connection::Connection;

use crate::{
    assertions::{assert_exit_code, check_installed},
    provision::EnvironmentKind,
};

use super::{
    install_script::{channel_args, check_command_line, installer, CHANNELS},
    Scenario, ScenarioContext, Scope, Suite,
};

const NO_SHELL_PACKAGE: &str =
    "no mender-shell in 'stable'; in 'experimental' depends on client 2.5.0 which is not there yet";

/// The board runs QEMU in a host network container, so the host is its
/// default gateway.
fn host_address(conn: &dyn Connection) -> Result<String, HarnessError> {
    let result = conn.run("ip route | grep default | awk '{print $3}'")?;
    let address = result.stdout.trim();
    if address.is_empty() {
        return Err(HarnessError::internal("No default route on the device"));
    }
    Ok(address.to_string())
}

/// Installer URL as seen from the board.
fn device_script_url(ctx: &ScenarioContext) -> Result<Url, HarnessError> {
    let mut url = ctx.script_url()?.clone();
    url.set_host(Some(&host_address(ctx.conn()?)?))
        .structured(InternalError::Internal("Invalid host address"))?;
    Ok(url)
}

fn sudo_install(ctx: &ScenarioContext, url: &Url, args: &str) -> Result<(), HarnessError> {
    let command = installer(url, args).replacen("| bash", "| sudo bash", 1);
    ctx.conn()?.run(&command)?;
    Ok(())
}

fn default(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let url = device_script_url(ctx)?;
    sudo_install(ctx, &url, &channel_args(ctx.param()))?;
    check_installed(conn, "mender-client", true)?;
    check_installed(conn, "mender-shell", true)
}

fn client(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let url = device_script_url(ctx)?;
    let args = format!("{} mender-client", channel_args(ctx.param()));
    sudo_install(ctx, &url, args.trim_start())?;

    check_installed(conn, "mender-client", true)?;
    let result = conn.run_warn("dpkg --status mender-shell")?;
    assert_exit_code(&result, 1)?;

    check_command_line(conn, &url)
}

fn shell(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let url = device_script_url(ctx)?;
    let args = format!("{} mender-shell", channel_args(ctx.param()));
    sudo_install(ctx, &url, args.trim_start())?;
    check_installed(conn, "mender-client", true)?;
    check_installed(conn, "mender-shell", true)
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("default", default)
        .with_params(CHANNELS)
        .skipped(NO_SHELL_PACKAGE),
    Scenario::new("client", client).with_params(CHANNELS),
    Scenario::new("shell", shell)
        .with_params(CHANNELS)
        .skipped(NO_SHELL_PACKAGE),
];

inventory::submit! {
    Suite {
        name: "install-script-legacy",
        description: "Installer script on the emulated Raspberry Pi, legacy client",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 30,
        needs_script_server: true,
        scenarios: SCENARIOS,
    }
}
