//! Development files of the client: the D-Bus interface descriptions.

use harness_api::error::HarnessError;
use osutils::files::FileExpectation;

use crate::{assertions::verify_files, provision::EnvironmentKind};

use super::{dpkg_install, upload, Scenario, ScenarioContext, Scope, Suite};

const DBUS_INTERFACES_DIR: &str = "/usr/share/dbus-1/interfaces";

fn mender_client_dev(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let client = upload(ctx, "mender-client")?;
    let dev = upload(ctx, "mender-client-dev")?;
    dpkg_install(ctx, &[&client, &dev], None)?;

    verify_files(
        ctx.conn()?,
        &[FileExpectation::file(format!(
            "{DBUS_INTERFACES_DIR}/io.mender.Authentication1.xml"
        ))],
    )
}

const SCENARIOS: &[Scenario] = &[Scenario::new("mender-client-dev", mender_client_dev)];

inventory::submit! {
    Suite {
        name: "client-dev",
        description: "Client development package",
        environment: EnvironmentKind::RaspbianConfigured,
        scope: Scope::PerSuite,
        markers: &[],
        order: 51,
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

    #[test]
    fn test_mender_client_dev() {
        let test_dir = tempdir().unwrap();
        let config = TestConfig {
            packages_dir: test_dir.path().into(),
            package_versions: btreemap! {
                "mender-client".to_string() => "4.0.4-1+raspbian+buster".to_string(),
            },
            ..Default::default()
        };
        let mut filenames = Vec::new();
        for name in ["mender-client", "mender-client-dev"] {
            let package = BuiltPackage::resolve(&config, &config.device.platform, name).unwrap();
            files::write_file(&package.path, 0o644, b"deb").unwrap();
            filenames.push(package.filename);
        }
        assert_eq!(filenames[1], "mender-client-dev_4.0.4-1+raspbian+buster_all.deb");

        let conn = MockConnection::new();
        conn.respond_stdout(
            "dpkg --install",
            "Unpacking mender-client (4.0.4-1+raspbian+buster) over (4.0.4-1+raspbian+buster) ...\n\
             Unpacking mender-client-dev (4.0.4-1+raspbian+buster) ...\n\
             Setting up mender-client (4.0.4-1+raspbian+buster) ...\n\
             Setting up mender-client-dev (4.0.4-1+raspbian+buster) ...\n",
        );

        mender_client_dev(&context(&conn, &config, None, None)).unwrap();
        assert!(conn.ran(&format!("{} {}", filenames[0], filenames[1])));
        assert!(conn.ran("test -f /usr/share/dbus-1/interfaces/io.mender.Authentication1.xml"));
    }
}
