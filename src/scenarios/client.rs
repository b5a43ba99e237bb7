//! Lifecycle of the C++ client packages on the emulated board: install with
//! the default, non-interactive configuration, then remove and purge.

use log::debug;

use harness_api::{
    constants::{CLIENT_CONFIG_FILE, HOSTED_SERVER_URL, INVENTORY_DIR, UPDATE_MODULES_DIR},
    ensure,
    error::HarnessError,
};
use osutils::{
    apt::Apt,
    connection::Connection,
    dpkg::{Dpkg, Progress},
    files::FileExpectation,
    journal::journal_command,
};

use crate::{
    assertions::{
        assert_dpkg_progress, assert_output_contains, check_installed, verify_files, wait_for_any,
        INSTALL_PROGRESS,
    },
    provision::EnvironmentKind,
};

use super::{upload, Marker, Scenario, ScenarioContext, Scope, Suite};

/// md5sum of the Northern.tech copyright file, without its first line.
const COPYRIGHT_MD5SUM: &str = "39a30292da940b7ce011150e8c8d5e4f";
const COPYRIGHT_FILE: &str = "/usr/share/doc/mender-client/copyright";

const INVENTORY_SCRIPTS: &[&str] = &[
    "mender-inventory-bootloader-integration",
    "mender-inventory-hostinfo",
    "mender-inventory-network",
    "mender-inventory-os",
    "mender-inventory-rootfs-type",
    "mender-device-identity",
];

const UPDATE_MODULES: &[&str] = &["deb", "directory", "rpm", "script", "single-file"];

const SERVICES: &[&str] = &["mender-updated", "mender-authd"];

/// Journal lines marking a full cycle, depending on the client version.
const CYCLE_LINES: &[&str] = &[
    "State transition: authorize [Sync] -> authorize-wait [Idle]",
    "State transition: check-wait [Idle] -> update-check [Sync]",
    "State transition: check-wait [Idle] -> inventory-update [Sync]",
];

const BOOT_LINES: &[&str] = &[
    "Started Mender OTA update service.",
    "Loaded configuration file",
    "No dual rootfs configuration present",
];

const AUTHORIZATION_FAILURE_LINES: &[&str] = &[
    "Reauthorization failed with error: transient error: authorization request failed",
    "Authorize failed: transient error: authorization request failed",
];

fn installed_files() -> Vec<FileExpectation> {
    let mut files = vec![
        FileExpectation::executable("/usr/bin/mender-update"),
        FileExpectation::executable("/usr/bin/mender-auth"),
        FileExpectation::directory(UPDATE_MODULES_DIR),
        FileExpectation::directory(INVENTORY_DIR),
    ];
    files.extend(
        UPDATE_MODULES
            .iter()
            .map(|m| FileExpectation::executable(format!("{UPDATE_MODULES_DIR}/{m}"))),
    );
    files.extend(
        INVENTORY_SCRIPTS
            .iter()
            .map(|s| FileExpectation::executable(format!("{INVENTORY_DIR}/{s}"))),
    );
    files.extend([
        FileExpectation::directory("/etc/mender"),
        FileExpectation::file(CLIENT_CONFIG_FILE),
        FileExpectation::directory("/etc/mender/scripts"),
        FileExpectation::executable("/etc/mender/scripts/version").with_contents("3"),
    ]);
    for service in SERVICES {
        files.push(FileExpectation::file(format!(
            "/lib/systemd/system/{service}.service"
        )));
        files.push(FileExpectation::symlink(format!(
            "/etc/systemd/system/multi-user.target.wants/{service}.service"
        )));
    }
    files.extend([
        FileExpectation::file("/usr/share/doc/mender/examples/demo.crt"),
        FileExpectation::file("/var/lib/mender/device_type").with_contents("device_type=unknown"),
        FileExpectation::file(COPYRIGHT_FILE),
    ]);
    files
}

fn check_version(conn: &dyn Connection, version: Option<&str>) -> Result<(), HarnessError> {
    match version {
        Some(version) if version != harness_api::version::MASTER_VERSION => {
            let result = conn.run("mender-update --version")?;
            assert_output_contains(&result, version)
        }
        _ => Ok(()),
    }
}

fn check_copyright(conn: &dyn Connection) -> Result<(), HarnessError> {
    let result = conn.run(&format!("tail -n +2 {COPYRIGHT_FILE} | md5sum"))?;
    let checksum = result.stdout.split_whitespace().next().unwrap_or_default();
    ensure!(
        checksum == COPYRIGHT_MD5SUM,
        "Copyright file checksum is '{checksum}', expected '{COPYRIGHT_MD5SUM}'"
    );
    Ok(())
}

fn install_configure_start(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let result = conn.run("uname -a")?;
    assert_output_contains(&result, &ctx.config.device.hostname)?;

    conn.sudo(&Apt::update().apt_get().to_string())?;

    let client = upload(ctx, "mender-client")?;
    let auth = upload(ctx, "mender-auth")?;
    let update = upload(ctx, "mender-update")?;

    // One by one, apt pulls in whatever dependencies are missing
    for package in [&update, &auth] {
        let result = conn.sudo(
            &Apt::install([Apt::local(&package.filename)])
                .noninteractive()
                .to_string(),
        )?;
        assert_dpkg_progress(&result, INSTALL_PROGRESS, package.name(), &package.version)?;
    }
    conn.sudo(
        &Apt::install([Apt::local(&client.filename)])
            .noninteractive()
            .to_string(),
    )?;

    check_version(conn, ctx.config.versions.mender_client.as_deref())?;
    verify_files(conn, &installed_files())?;
    check_copyright(conn)?;

    // The default setup points at the hosted server
    let result = conn.sudo(&format!("cat {CLIENT_CONFIG_FILE}"))?;
    assert_output_contains(&result, &format!(r#""ServerURL": "{HOSTED_SERVER_URL}""#))
}

/// Watch the journal for a full cycle of the client, which ends in failed
/// authorization as there is no server.
fn start_full_cycle(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    conn.run("pgrep mender-update")?;

    let (timeout, interval) = ctx.config.timeouts.client_cycle();
    let journal = journal_command("mender-client");
    let found = wait_for_any(conn, &journal, CYCLE_LINES, timeout, interval)?;
    debug!("Client went through a cycle: '{found}'");

    let result = conn.sudo(&journal)?;
    for line in BOOT_LINES {
        assert_output_contains(&result, line)?;
    }

    wait_for_any(conn, &journal, AUTHORIZATION_FAILURE_LINES, timeout, interval)?;
    Ok(())
}

fn remove_stop(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let result = ctx
        .conn()?
        .sudo(&Dpkg::remove(["mender-client"]).to_string())?;
    assert_dpkg_progress(
        &result,
        &[Progress::Removing],
        "mender-client",
        ctx.package_version("mender-client")?,
    )
}

fn purge(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let result = conn.sudo(&Dpkg::purge(["mender-client"]).to_string())?;
    assert_dpkg_progress(
        &result,
        &[Progress::Purging],
        "mender-client",
        ctx.package_version("mender-client")?,
    )?;

    // Only the meta package is gone, the client itself stays
    check_installed(conn, "mender-client", false)?;
    check_installed(conn, "mender-update", true)?;
    verify_files(conn, &[FileExpectation::executable("/usr/bin/mender-update")])
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("install-configure-start", install_configure_start),
    Scenario::new("start-full-cycle", start_full_cycle)
        .skipped("journal checks follow the legacy mender-client unit"),
    Scenario::new("remove-stop", remove_stop),
    Scenario::new("purge", purge),
];

inventory::submit! {
    Suite {
        name: "client",
        description: "C++ client packages with the default configuration",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerSuite,
        markers: &[Marker::Cppclient],
        order: 40,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use maplit::btreemap;
    use tempfile::tempdir;

    use harness_api::config::TestConfig;
    use osutils::{
        connection::{mock::MockConnection, CommandResult},
        files,
    };

    use crate::{packages::BuiltPackage, scenarios::test_utils::context};

    use super::*;

    fn config(packages_dir: &std::path::Path) -> TestConfig {
        let mut config = TestConfig {
            packages_dir: packages_dir.into(),
            package_versions: btreemap! {
                "mender-client".to_string() => "4.1.0-1".to_string(),
            },
            ..Default::default()
        };
        config.versions.mender_client = Some("4.1.0".into());
        config
    }

    #[test]
    fn test_installed_files() {
        let files = installed_files();
        assert!(files
            .iter()
            .any(|f| f.path == "/usr/share/mender/modules/v3/single-file"));
        assert!(files
            .iter()
            .any(|f| f.path == "/usr/share/mender/inventory/mender-device-identity"));
        assert!(files.iter().any(|f| f.path
            == "/etc/systemd/system/multi-user.target.wants/mender-updated.service"));
    }

    #[test]
    fn test_install_configure_start() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        for name in ["mender-client", "mender-auth", "mender-update"] {
            let package =
                BuiltPackage::resolve(&config, &config.device.platform, name).unwrap();
            files::write_file(&package.path, 0o644, b"deb").unwrap();
        }

        let conn = MockConnection::new().with_sudo();
        conn.respond_stdout("uname -a", "Linux raspberrypi 4.19.50+ armv6l GNU/Linux\n")
            .respond_stdout(
                "./mender-update_",
                "Unpacking mender-update (4.1.0-1) ...\nSetting up mender-update (4.1.0-1) ...\n",
            )
            .respond_stdout(
                "./mender-auth_",
                "Unpacking mender-auth (4.1.0-1) ...\nSetting up mender-auth (4.1.0-1) ...\n",
            )
            .respond_stdout("--version", "4.1.0\n")
            .respond_stdout("cat /etc/mender/scripts/version", "3\n")
            .respond_stdout("cat /var/lib/mender/device_type", "device_type=unknown\n")
            .respond_stdout("md5sum", "39a30292da940b7ce011150e8c8d5e4f  -\n")
            .respond_stdout(
                "cat /etc/mender/mender.conf",
                indoc! {r#"
                    {
                      "ServerURL": "https://hosted.mender.io"
                    }
                "#},
            );

        install_configure_start(&context(&conn, &config, None, None)).unwrap();
        assert_eq!(conn.uploads().len(), 3);
        assert!(conn.ran("sudo bash -c 'apt-get update'"));
    }

    #[test]
    fn test_copyright_mismatch() {
        let conn = MockConnection::new();
        conn.respond_stdout("md5sum", "d41d8cd98f00b204e9800998ecf8427e  -\n");
        let error = check_copyright(&conn).unwrap_err();
        assert!(error.is_assertion());
    }

    #[test]
    fn test_purge() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        let conn = MockConnection::new();
        conn.respond_stdout(
            "dpkg --purge",
            "Purging configuration files for mender-client (4.1.0-1) ...\n",
        )
        .respond(
            "dpkg --status mender-client",
            CommandResult::new(1, "", "dpkg-query: package 'mender-client' is not installed"),
        )
        .respond_stdout("dpkg --status mender-update", "Status: install ok installed\n");

        purge(&context(&conn, &config, None, None)).unwrap();
    }
}
