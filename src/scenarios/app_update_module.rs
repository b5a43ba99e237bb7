//! The application update module, installed without a client and removed.

use harness_api::{constants::UPDATE_MODULES_DIR, error::HarnessError};
use osutils::{
    dpkg::{Dpkg, Progress},
    files::FileExpectation,
};

use crate::{
    assertions::{assert_dpkg_progress, check_installed, verify_files},
    provision::EnvironmentKind,
};

use super::{dpkg_install, upload, Scenario, ScenarioContext, Scope, Suite};

const PACKAGE: &str = "mender-app-update-module";
const APP_MODULES_DIR: &str = "/usr/share/mender/app-modules/v1";
const UPDATE_MODULES: &[&str] = &["app"];
const APP_MODULES: &[&str] = &["k8s", "docker-compose"];

fn module_paths() -> impl Iterator<Item = String> {
    UPDATE_MODULES
        .iter()
        .map(|m| format!("{UPDATE_MODULES_DIR}/{m}"))
        .chain(APP_MODULES.iter().map(|m| format!("{APP_MODULES_DIR}/{m}")))
}

fn install(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    let package = upload(ctx, PACKAGE)?;
    dpkg_install(ctx, &[&package], Some("mender-client"))?;
    check_installed(conn, PACKAGE, true)?;

    let mut expectations = vec![
        FileExpectation::directory(UPDATE_MODULES_DIR),
        FileExpectation::directory(APP_MODULES_DIR),
    ];
    expectations.extend(module_paths().map(FileExpectation::executable));
    verify_files(conn, &expectations)
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

    let expectations: Vec<_> = module_paths().map(FileExpectation::not_executable).collect();
    verify_files(conn, &expectations)
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("install", install),
    Scenario::new("remove", remove),
];

inventory::submit! {
    Suite {
        name: "app-update-module",
        description: "Application update module, without a client",
        environment: EnvironmentKind::Raspbian,
        scope: Scope::PerSuite,
        markers: &[],
        order: 53,
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

    fn config(packages_dir: &std::path::Path) -> TestConfig {
        TestConfig {
            packages_dir: packages_dir.into(),
            package_versions: btreemap! {
                PACKAGE.to_string() => "1.1.0-1+raspbian+buster".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_install() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        let package = BuiltPackage::resolve(&config, &config.device.platform, PACKAGE).unwrap();
        files::write_file(&package.path, 0o644, b"deb").unwrap();

        let conn = MockConnection::new();
        conn.respond_stdout(
            "--ignore-depends=mender-client",
            "Unpacking mender-app-update-module (1.1.0-1+raspbian+buster) ...\n\
             Setting up mender-app-update-module (1.1.0-1+raspbian+buster) ...\n",
        )
        .respond_stdout("dpkg --status", "Status: install ok installed\n");

        install(&context(&conn, &config, None, None)).unwrap();
        assert!(conn.ran(
            "DEBIAN_FRONTEND=noninteractive dpkg --install --ignore-depends=mender-client \
             mender-app-update-module_1.1.0-1+raspbian+buster_all.deb"
        ));
        assert!(conn.ran("test -x /usr/share/mender/app-modules/v1/k8s"));
    }

    #[test]
    fn test_remove() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        let conn = MockConnection::new();
        conn.respond_stdout(
            "dpkg --remove",
            "Removing mender-app-update-module (1.1.0-1+raspbian+buster) ...\n",
        );

        remove(&context(&conn, &config, None, None)).unwrap();
        assert!(conn.ran("test ! -x /usr/share/mender/modules/v3/app"));
        assert!(conn.ran("test ! -x /usr/share/mender/app-modules/v1/docker-compose"));
    }
}
