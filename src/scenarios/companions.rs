//! Small companion packages of the client, each installed on a fresh board
//! with only what it needs.

use harness_api::{constants::INVENTORY_DIR, error::HarnessError};
use osutils::files::FileExpectation;

use crate::{
    assertions::{assert_output_contains, check_installed, verify_files},
    provision::EnvironmentKind,
};

use super::{dpkg_install, upload, Scenario, ScenarioContext, Scope, Suite};

/// Install `name` with dpkg, optionally without `ignore_depends`, and check
/// that it put `executable` in place.
fn install_companion(
    ctx: &ScenarioContext,
    name: &str,
    ignore_depends: Option<&str>,
    executable: &str,
) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let package = upload(ctx, name)?;
    dpkg_install(ctx, &[&package], ignore_depends)?;
    check_installed(conn, name, true)?;
    verify_files(conn, &[FileExpectation::executable(executable)])
}

fn setup(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let result = ctx.conn()?.run("uname -a")?;
    assert_output_contains(&result, &ctx.config.device.hostname)?;
    install_companion(ctx, "mender-setup", None, "/usr/bin/mender-setup")
}

fn flash(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    install_companion(ctx, "mender-flash", Some("mender-update"), "/usr/bin/mender-flash")
}

fn snapshot(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    install_companion(ctx, "mender-snapshot", None, "/usr/bin/mender-snapshot")
}

fn inventory_script(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    install_companion(
        ctx,
        "mender-client-version-inventory-script",
        Some("mender-update"),
        &format!("{INVENTORY_DIR}/mender-inventory-client-version"),
    )
}

inventory::submit! {
    Suite {
        name: "setup",
        description: "Interactive setup tool",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 70,
        needs_script_server: false,
        scenarios: &[Scenario::new("install", setup)],
    }
}

inventory::submit! {
    Suite {
        name: "flash",
        description: "Flash writer used by the rootfs update module",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 70,
        needs_script_server: false,
        scenarios: &[Scenario::new("install", flash)],
    }
}

inventory::submit! {
    Suite {
        name: "snapshot",
        description: "Filesystem snapshot tool",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 70,
        needs_script_server: false,
        scenarios: &[Scenario::new("install", snapshot)],
    }
}

inventory::submit! {
    Suite {
        name: "inventory-script",
        description: "Client version inventory script",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 70,
        needs_script_server: false,
        scenarios: &[Scenario::new("install", inventory_script)],
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use maplit::btreemap;
    use tempfile::tempdir;

    use harness_api::config::TestConfig;
    use osutils::{connection::mock::MockConnection, files};

    use crate::{
        packages::BuiltPackage,
        scenarios::{find_suite, test_utils::context},
    };

    use super::*;

    fn config(packages_dir: &Path, name: &str, version: &str) -> TestConfig {
        let config = TestConfig {
            packages_dir: packages_dir.into(),
            package_versions: btreemap! {
                name.to_string() => version.to_string(),
            },
            ..Default::default()
        };
        let package = BuiltPackage::resolve(&config, &config.device.platform, name).unwrap();
        files::write_file(&package.path, 0o644, b"deb").unwrap();
        config
    }

    #[test]
    fn test_flash() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path(), "mender-flash", "1.0.0-1+raspbian+buster");
        let conn = MockConnection::new();
        conn.respond_stdout(
            "dpkg --install",
            "Unpacking mender-flash (1.0.0-1+raspbian+buster) ...\n\
             Setting up mender-flash (1.0.0-1+raspbian+buster) ...\n",
        )
        .respond_stdout("dpkg --status mender-flash", "Status: install ok installed\n");

        flash(&context(&conn, &config, None, None)).unwrap();
        assert!(conn.ran(
            "--ignore-depends=mender-update mender-flash_1.0.0-1+raspbian+buster_armhf.deb"
        ));
        assert!(conn.ran("test -x /usr/bin/mender-flash"));
    }

    #[test]
    fn test_inventory_script_not_installed() {
        let test_dir = tempdir().unwrap();
        let config = config(
            test_dir.path(),
            "mender-client-version-inventory-script",
            "1.0.0-1+raspbian+buster",
        );
        let conn = MockConnection::new();
        conn.respond_stdout(
            "dpkg --install",
            "Unpacking mender-client-version-inventory-script (1.0.0-1+raspbian+buster) ...\n\
             Setting up mender-client-version-inventory-script (1.0.0-1+raspbian+buster) ...\n",
        );

        let error = inventory_script(&context(&conn, &config, None, None)).unwrap_err();
        assert_eq!(
            error.kind().to_string(),
            "Package 'mender-client-version-inventory-script' is not installed"
        );
    }

    #[test]
    fn test_suites() {
        for name in ["setup", "flash", "snapshot", "inventory-script"] {
            let suite = find_suite(name).unwrap();
            assert_eq!(suite.environment, EnvironmentKind::Raspbian);
            assert_eq!(suite.instances().len(), 1);
        }
    }
}
