//! The commercial gateway package.

use harness_api::error::HarnessError;
use osutils::files::FileExpectation;

use crate::{assertions::verify_files, provision::EnvironmentKind};

use super::{dpkg_install, upload, Marker, Scenario, ScenarioContext, Scope, Suite};

fn mender_gateway(ctx: &ScenarioContext) -> Result<(), HarnessError> {
    let package = upload(ctx, "mender-gateway")?;
    dpkg_install(ctx, &[&package], None)?;

    verify_files(
        ctx.conn()?,
        &[
            FileExpectation::executable("/usr/bin/mender-gateway"),
            FileExpectation::file("/etc/mender/mender-gateway.conf"),
            FileExpectation::file("/lib/systemd/system/mender-gateway.service"),
        ],
    )
}

const SCENARIOS: &[Scenario] = &[Scenario::new("mender-gateway", mender_gateway)];

inventory::submit! {
    Suite {
        name: "gateway",
        description: "Commercial gateway package",
        environment: EnvironmentKind::RaspbianConfigured,
        scope: Scope::PerSuite,
        markers: &[Marker::Commercial],
        order: 60,
        needs_script_server: false,
        scenarios: SCENARIOS,
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use tempfile::tempdir;

    use harness_api::config::TestConfig;
    use osutils::connection::mock::MockConnection;

    use crate::scenarios::test_utils::context;

    use super::*;

    #[test]
    fn test_missing_commercial_package() {
        let test_dir = tempdir().unwrap();
        let config = TestConfig {
            packages_dir: test_dir.path().into(),
            package_versions: btreemap! {
                "mender-gateway".to_string() => "1.2.0-1+raspbian+buster".to_string(),
            },
            ..Default::default()
        };
        let conn = MockConnection::new();

        let error = mender_gateway(&context(&conn, &config, None, None)).unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "invalid-input");
        assert!(error.kind().to_string().contains(
            "commercial/raspios-buster-armhf/mender-gateway_1.2.0-1+raspbian+buster_armhf.deb"
        ));
        assert!(conn.commands().is_empty());
    }
}
