//! Add-on packages on top of a configured client.

use harness_api::{
    constants::{CONNECT_CONFIG_FILE, INVENTORY_DIR, UPDATE_MODULES_DIR},
    ensure,
    error::HarnessError,
    version::{master_short_hash, MASTER_VERSION},
};
use osutils::files::FileExpectation;

use crate::{
    assertions::{assert_output_contains, verify_files},
    provision::EnvironmentKind,
};

use super::{dpkg_install, upload, Scenario, ScenarioContext, Scope, Suite};

fn mender_connect(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let package = upload(ctx, "mender-connect")?;
    dpkg_install(ctx, &[&package], None)?;

    verify_files(
        conn,
        &[
            FileExpectation::executable("/usr/bin/mender-connect"),
            FileExpectation::file(CONNECT_CONFIG_FILE),
            FileExpectation::file("/lib/systemd/system/mender-connect.service"),
        ],
    )?;

    match ctx.config.versions.mender_connect.as_deref() {
        // Master builds print the short commit hash of the package version
        Some(MASTER_VERSION) => {
            ensure!(
                master_short_hash(&package.version).is_some(),
                "Package version '{}' of a master build carries no commit hash",
                package.version
            );
            Ok(())
        }
        Some(version) => {
            let result = conn.run("mender-connect version")?;
            assert_output_contains(&result, version)
        }
        None => Ok(()),
    }
}

fn mender_configure(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let package = upload(ctx, "mender-configure")?;
    dpkg_install(ctx, &[&package], None)?;

    verify_files(
        ctx.conn()?,
        &[
            FileExpectation::executable(format!("{UPDATE_MODULES_DIR}/mender-configure")),
            FileExpectation::executable(format!(
                "{INVENTORY_DIR}/mender-inventory-mender-configure"
            )),
        ],
    )
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("mender-connect", mender_connect),
    Scenario::new("mender-configure", mender_configure),
];

inventory::submit! {
    Suite {
        name: "addons",
        description: "mender-connect and mender-configure on a configured client",
        environment: EnvironmentKind::RaspbianConfigured,
        scope: Scope::PerSuite,
        markers: &[],
        order: 50,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use tempfile::tempdir;

    use harness_api::config::TestConfig;
    use osutils::{connection::mock::MockConnection, files};

    use crate::{packages::BuiltPackage, scenarios::test_utils::context};

    use super::*;

    fn setup(packages_dir: &std::path::Path, connect_version: &str) -> TestConfig {
        let mut config = TestConfig {
            packages_dir: packages_dir.into(),
            package_versions: btreemap! {
                "mender-connect".to_string() => "2.3.0~git20240105.aa8f2e1-1".to_string(),
            },
            ..Default::default()
        };
        config.versions.mender_connect = Some(connect_version.into());

        let package =
            BuiltPackage::resolve(&config, &config.device.platform, "mender-connect").unwrap();
        files::write_file(&package.path, 0o644, b"deb").unwrap();
        config
    }

    const CONNECT_PROGRESS: &str = "Unpacking mender-connect (2.3.0~git20240105.aa8f2e1-1) ...\n\
                                    Setting up mender-connect (2.3.0~git20240105.aa8f2e1-1) ...\n";

    #[test]
    fn test_mender_connect_master() {
        let test_dir = tempdir().unwrap();
        let config = setup(test_dir.path(), "master");
        let conn = MockConnection::new();
        conn.respond_stdout("dpkg --install", CONNECT_PROGRESS);

        mender_connect(&context(&conn, &config, None, None)).unwrap();
        assert!(conn.ran("test -f /etc/mender/mender-connect.conf"));
        assert!(!conn.ran("mender-connect version"));
    }

    #[test]
    fn test_mender_connect_version_mismatch() {
        let test_dir = tempdir().unwrap();
        let config = setup(test_dir.path(), "2.3.0");
        let conn = MockConnection::new();
        conn.respond_stdout("dpkg --install", CONNECT_PROGRESS)
            .respond_stdout("mender-connect version", "2.2.1\n");

        let error = mender_connect(&context(&conn, &config, None, None)).unwrap_err();
        assert!(error.is_assertion());
    }
}
