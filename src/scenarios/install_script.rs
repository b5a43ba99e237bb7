//! The installer script on a plain Debian container, against the upstream
//! repository and the freshly built packages.

use url::Url;

use harness_api::{constants::HOSTED_SERVER_URL, error::HarnessError};
use osutils::{apt::Apt, connection::Connection};

use crate::{
    apt_repo,
    assertions::{assert_exit_code, assert_output_contains, check_all_installed, check_installed},
    provision::EnvironmentKind,
};

use super::{Scenario, ScenarioContext, Scope, Suite};

/// Release channels of the upstream repository. Empty is the default one.
pub(super) const CHANNELS: &[&str] = &["", "stable", "experimental"];

/// Packages the default install brings in.
const DEFAULT_PACKAGES: &[&str] = &["mender-client", "mender-configure", "mender-connect"];

/// Packages of the v4 client besides the meta package.
const V4_PACKAGES: &[&str] = &[
    "mender-update",
    "mender-auth",
    "mender-flash",
    "mender-setup",
    "mender-snapshot",
];

const ADDONS: &[&str] = &["mender-connect", "mender-configure"];

/// Command piping the installer script into bash with `args`.
pub(super) fn installer(url: &Url, args: &str) -> String {
    if args.is_empty() {
        format!("curl {url} | bash -s")
    } else {
        format!("curl {url} | bash -s -- {args}")
    }
}

/// `-c <channel>`, or nothing for the default channel.
pub(super) fn channel_args(channel: &str) -> String {
    if channel.is_empty() {
        String::new()
    } else {
        format!("-c {channel}")
    }
}

/// Run the installer script with `args` and fail unless it succeeds.
fn install(ctx: &ScenarioContext, args: &str) -> Result<(), HarnessError> {
    ctx.conn()?.run(&installer(ctx.script_url()?, args))?;
    Ok(())
}

/// The usage text and the rejection of unknown arguments.
pub(super) fn check_command_line(conn: &dyn Connection, url: &Url) -> Result<(), HarnessError> {
    let result = conn.run(&installer(url, "-h"))?;
    assert_output_contains(&result, "usage:")?;

    let result = conn.run_warn(&installer(url, "unknown"))?;
    assert_exit_code(&result, 1)?;
    assert_output_contains(&result, "Unsupported argument: `unknown`")
}

fn default(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, &channel_args(ctx.param()))?;
    check_all_installed(conn, DEFAULT_PACKAGES, true)?;

    // Piggyback the command line checks on this container
    check_command_line(conn, ctx.script_url()?)
}

fn setup_mender(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(
        ctx,
        "-- --demo --device-type cool-device --hosted-mender --tenant-token my-secret-token",
    )?;

    let result = conn.run("cat /etc/mender/mender.conf")?;
    assert_output_contains(&result, &format!(r#""ServerURL": "{HOSTED_SERVER_URL}""#))?;

    let result = conn.run("cat /var/lib/mender/device_type")?;
    harness_api::ensure!(
        result.stdout.trim() == "device_type=cool-device",
        "Unexpected device type file contents '{}'",
        result.stdout.trim()
    );

    let result = conn.run("cat /etc/mender/mender-connect.conf")?;
    assert_output_contains(&result, r#""User": "nobody""#)
}

fn setup_addons(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    install(ctx, "--demo")?;
    let result = ctx.conn()?.run("cat /etc/mender/mender-connect.conf")?;
    assert_output_contains(&result, r#""User": "root""#)
}

fn client(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "mender-client")?;
    check_installed(conn, "mender-client", true)?;
    check_all_installed(conn, ADDONS, false)?;

    // Never known to dpkg, not just removed
    let result = conn.run_warn("dpkg --status mender-connect")?;
    assert_exit_code(&result, 1)
}

fn connect(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "mender-connect")?;
    check_all_installed(conn, &["mender-auth", "mender-connect"], true)?;
    check_installed(conn, "mender-configure", false)
}

fn configure(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "mender-configure")?;
    check_all_installed(conn, &["mender-auth", "mender-update", "mender-configure"], true)?;
    check_installed(conn, "mender-connect", false)
}

/// Install the latest stable release with the script, then upgrade to the
/// built packages through a local repository.
fn upgrade_v3_series(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "")?;

    apt_repo::from_built_packages(conn, ctx.config)?;
    conn.run(&Apt::upgrade().to_string())?;

    // Only the legacy client is upgraded, the add-ons stay
    check_installed(conn, "mender-client", true)?;
    check_all_installed(conn, &["mender-client4"], false)?;
    check_all_installed(conn, V4_PACKAGES, false)?;
    check_all_installed(conn, ADDONS, true)
}

fn install_from_built(conn: &dyn Connection, packages: &[&str]) -> Result<(), HarnessError> {
    conn.run(&Apt::install(packages.iter().copied()).noninteractive().to_string())?;
    Ok(())
}

fn upgrade_v4_meta_package_with_addons(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "")?;

    apt_repo::from_built_packages(conn, ctx.config)?;
    install_from_built(conn, &["mender-update", "mender-client4"])?;

    check_installed(conn, "mender-client", false)?;
    check_installed(conn, "mender-client4", true)?;
    check_all_installed(conn, V4_PACKAGES, true)?;
    check_all_installed(conn, ADDONS, true)
}

fn upgrade_v4_meta_package_only_client(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "mender-client")?;

    apt_repo::from_built_packages(conn, ctx.config)?;
    install_from_built(conn, &["mender-client4"])?;

    check_installed(conn, "mender-client", false)?;
    check_installed(conn, "mender-client4", true)?;
    check_all_installed(conn, V4_PACKAGES, true)
}

fn upgrade_v4_explicit_auth_update(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    install(ctx, "")?;

    apt_repo::from_built_packages(conn, ctx.config)?;
    install_from_built(conn, &["mender-auth", "mender-update"])?;

    check_all_installed(conn, &["mender-client", "mender-client4"], false)?;
    check_all_installed(conn, &["mender-update", "mender-auth", "mender-flash"], true)?;
    check_all_installed(conn, ADDONS, true)
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("default", default).with_params(CHANNELS),
    Scenario::new("setup-mender", setup_mender),
    Scenario::new("setup-addons", setup_addons),
    Scenario::new("client", client),
    Scenario::new("connect", connect),
    Scenario::new("configure", configure),
    Scenario::new("upgrade-v3-series", upgrade_v3_series),
    Scenario::new(
        "upgrade-v4-meta-package-with-addons",
        upgrade_v4_meta_package_with_addons,
    ),
    Scenario::new(
        "upgrade-v4-meta-package-only-client",
        upgrade_v4_meta_package_only_client,
    ),
    Scenario::new(
        "upgrade-v4-explicit-auth-update",
        upgrade_v4_explicit_auth_update,
    ),
];

inventory::submit! {
    Suite {
        name: "install-script",
        description: "Installer script on a generic Debian container",
        environment: EnvironmentKind::GenericDebian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 10,
        needs_script_server: true,
        scenarios: SCENARIOS,
    }
}
