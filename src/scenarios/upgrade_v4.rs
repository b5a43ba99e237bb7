//! Upgrades across the v3 to v4 package split, from pinned upstream releases
//! to the freshly built packages.

use harness_api::error::HarnessError;
use osutils::{apt::Apt, connection::Connection};
use sysdefs::{arch::DebianArchitecture, distro::TargetPlatform};

use crate::{apt_repo, assertions::check_all_installed, provision::EnvironmentKind};

use super::{Scenario, ScenarioContext, Scope, Suite};

/// (name, version, architecture independent)
type PinnedPackage = (&'static str, &'static str, bool);

/// Client 3.5.1, epoch 0.
const RELEASE_3_5_1: &[PinnedPackage] = &[
    ("mender-client", "3.5.1", false),
    ("mender-connect", "2.1.1", false),
    ("mender-configure", "1.1.1", true),
];

/// Client 3.5.2, epoch 1.
const RELEASE_3_5_2: &[PinnedPackage] = &[
    ("mender-client", "3.5.2", false),
    ("mender-connect", "2.2.0", false),
    ("mender-configure", "1.1.1", true),
];

/// Client 4.0.0, published as test packages.
const RELEASE_4_0_0: &[PinnedPackage] = &[
    ("mender-client", "4.0.0", false),
    ("mender-update", "4.0.0", false),
    ("mender-auth", "4.0.0", false),
    ("mender-flash", "1.0.0", false),
    ("mender-setup", "1.0.0", false),
    ("mender-snapshot", "1.0.0", false),
    ("mender-connect", "2.2.0", false),
    ("mender-configure", "1.1.2", true),
];

const CLIENT_AND_ADDONS: &[&str] = &["mender-client", "mender-connect", "mender-configure"];

const V4_PACKAGES: &[&str] = &[
    "mender-client",
    "mender-update",
    "mender-auth",
    "mender-flash",
    "mender-setup",
    "mender-snapshot",
    "mender-connect",
    "mender-configure",
];

fn architecture(platform: &TargetPlatform, independent: bool) -> DebianArchitecture {
    if independent {
        DebianArchitecture::All
    } else {
        platform.architecture
    }
}

fn upstream_paths(platform: &TargetPlatform, release: &[PinnedPackage]) -> Vec<String> {
    release
        .iter()
        .map(|(name, version, independent)| {
            apt_repo::pool_path(
                name,
                version,
                &platform.release,
                architecture(platform, *independent),
            )
        })
        .collect()
}

fn test_paths(platform: &TargetPlatform, release: &[PinnedPackage]) -> Vec<String> {
    release
        .iter()
        .map(|(name, version, independent)| {
            apt_repo::test_pool_path(
                name,
                version,
                &platform.release,
                architecture(platform, *independent),
            )
        })
        .collect()
}

fn install_client_and_addons(conn: &dyn Connection) -> Result<(), HarnessError> {
    conn.run(
        &Apt::install(CLIENT_AND_ADDONS.iter().copied())
            .noninteractive()
            .to_string(),
    )?;
    Ok(())
}

/// `apt` rather than `apt-get`, the latter would hold back the packages new
/// in v4.
fn upgrade(conn: &dyn Connection) -> Result<(), HarnessError> {
    conn.run(&Apt::upgrade().to_string())?;
    Ok(())
}

fn upgrade_to_built(ctx: &ScenarioContext, expected: &[&str]) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    apt_repo::from_built_packages(conn, ctx.config)?;
    upgrade(conn)?;
    check_all_installed(conn, expected, true)
}

fn from_v3_to_v4_to_build(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    apt_repo::from_upstream_packages(
        conn,
        &upstream_paths(ctx.platform, RELEASE_3_5_1),
        "/mender_3_5_1",
    )?;
    install_client_and_addons(conn)?;
    check_all_installed(conn, CLIENT_AND_ADDONS, true)?;

    apt_repo::from_test_packages(conn, &test_paths(ctx.platform, RELEASE_4_0_0), "/mender_4_0_0")?;
    upgrade(conn)?;
    check_all_installed(conn, V4_PACKAGES, true)?;

    upgrade_to_built(ctx, V4_PACKAGES)
}

fn from_v3_to_build(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    apt_repo::from_upstream_packages(
        conn,
        &upstream_paths(ctx.platform, RELEASE_3_5_2),
        "/mender_3_5_2",
    )?;
    install_client_and_addons(conn)?;
    check_all_installed(conn, CLIENT_AND_ADDONS, true)?;

    upgrade_to_built(ctx, CLIENT_AND_ADDONS)
}

fn from_v4_to_build(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let conn = ctx.conn()?;
    apt_repo::from_test_packages(conn, &test_paths(ctx.platform, RELEASE_4_0_0), "/mender_4_0_0")?;
    install_client_and_addons(conn)?;

    upgrade_to_built(ctx, CLIENT_AND_ADDONS)
}

const SCENARIOS: &[Scenario] = &[
    Scenario::new("from-v3-to-v4-to-build", from_v3_to_v4_to_build),
    Scenario::new("from-v3-to-build", from_v3_to_build),
    Scenario::new("from-v4-to-build", from_v4_to_build),
];

inventory::submit! {
    Suite {
        name: "upgrade-v4",
        description: "Upgrades from pinned v3 and v4 releases to the built packages",
        environment: EnvironmentKind::GenericDebian,
        scope: Scope::PerScenario,
        markers: &[],
        order: 20,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}

#[cfg(test)]
mod tests {
    use harness_api::config::TestConfig;
    use osutils::connection::mock::MockConnection;

    use crate::scenarios::test_utils::context;

    use super::*;

    #[test]
    fn test_pool_paths() {
        let config = TestConfig::default();
        assert_eq!(
            upstream_paths(&config.platform, RELEASE_3_5_1),
            vec![
                "m/mender-client/mender-client_3.5.1-1+debian+buster_amd64.deb",
                "m/mender-connect/mender-connect_2.1.1-1+debian+buster_amd64.deb",
                "m/mender-configure/mender-configure_1.1.1-1+debian+buster_all.deb",
            ]
        );
        assert_eq!(
            test_paths(&config.platform, RELEASE_4_0_0)[7],
            "mender-configure_1.1.2-1+debian+buster_all.deb"
        );
    }

    #[test]
    fn test_missing_built_packages() {
        let conn = MockConnection::new();
        conn.respond_stdout("dpkg --status", "Status: install ok installed\n");
        let test_dir = tempfile::tempdir().unwrap();
        let config = TestConfig {
            packages_dir: test_dir.path().into(),
            ..Default::default()
        };
        let ctx = ScenarioContext {
            platform: &config.platform,
            ..context(&conn, &config, None, None)
        };

        let error = from_v3_to_build(&ctx).unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "invalid-input");
        assert!(conn.ran(
            "curl --remote-name https://downloads.mender.io/repos/debian/pool/main/\
             m/mender-client/mender-client_3.5.2-1+debian+buster_amd64.deb"
        ));
        assert!(conn.ran(
            "DEBIAN_FRONTEND=noninteractive apt --assume-yes install \
             mender-client mender-connect mender-configure"
        ));
        assert!(!conn.ran("apt --assume-yes upgrade"));
    }
}
