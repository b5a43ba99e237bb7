use log::info;

use harness_api::{
    config::TestConfig,
    constants::{CLIENT_CONFIG_FILE, CLIENT_DATA_DIR, DEVICE_TYPE_FILE},
    error::{HarnessError, HarnessResultExt},
};
use osutils::{apt::Apt, connection::Connection};
use sysdefs::distro::TargetPlatform;

use crate::{
    assertions::{self, INSTALL_PROGRESS},
    packages,
};

/// Packages making up a working client, in install order.
const CLIENT_PACKAGES: &[&str] = &["mender-auth", "mender-update", "mender-client"];

/// Device type the add-on suites expect.
const DEVICE_TYPE: &str = "raspberrypi3";

/// Install the built client packages on the device and configure the client
/// for demo use, so that add-ons have something to plug into.
pub fn setup_mender_configured(
    conn: &dyn Connection,
    config: &TestConfig,
    platform: &TargetPlatform,
) -> Result<(), HarnessError> {
    conn.sudo(&Apt::update().apt_get().to_string())?;

    let mut files = Vec::new();
    for name in CLIENT_PACKAGES {
        let package = packages::upload_deb_package(conn, config, platform, name)?;
        files.push(package);
    }

    let result = conn
        .sudo(
            &Apt::install(files.iter().map(|p| Apt::local(&p.filename)))
                .noninteractive()
                .to_string(),
        )
        .message("Failed to install the client packages")?;
    for package in files.iter().filter(|p| p.name() != "mender-client") {
        assertions::assert_dpkg_progress(&result, INSTALL_PROGRESS, package.name(), &package.version)?;
    }

    configure_demo(conn).message("Failed to configure the client")?;
    info!("Client installed and configured on {}", conn.describe());
    Ok(())
}

/// The documented manual setup: demo configuration and a device type.
fn configure_demo(conn: &dyn Connection) -> Result<(), HarnessError> {
    let demo = format!("{CLIENT_CONFIG_FILE}.demo");
    if conn.run_warn(&format!("test -f {demo}"))?.success() {
        conn.sudo(&format!("cp {demo} {CLIENT_CONFIG_FILE}"))?;
    }
    conn.sudo(&format!("mkdir -p {CLIENT_DATA_DIR}"))?;
    conn.sudo(&format!("echo device_type={DEVICE_TYPE} | tee {DEVICE_TYPE_FILE}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use maplit::btreemap;
    use tempfile::tempdir;

    use osutils::{
        connection::{mock::MockConnection, CommandResult},
        files,
    };

    use crate::packages::BuiltPackage;

    use super::*;

    fn config(packages_dir: &Path) -> TestConfig {
        TestConfig {
            packages_dir: packages_dir.into(),
            package_versions: btreemap! {
                "mender-client".to_string() => "4.0.0-1".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_setup_mender_configured() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        let platform = config.device.platform.clone();
        for name in CLIENT_PACKAGES {
            let package = BuiltPackage::resolve(&config, &platform, name).unwrap();
            files::write_file(&package.path, 0o644, b"deb").unwrap();
        }

        let conn = MockConnection::new().with_sudo();
        conn.respond_stdout(
            "apt --assume-yes install",
            "Unpacking mender-auth (4.0.0-1) ...\n\
             Unpacking mender-update (4.0.0-1) ...\n\
             Setting up mender-auth (4.0.0-1) ...\n\
             Setting up mender-update (4.0.0-1) ...\n",
        );
        conn.respond("test -f", CommandResult::new(1, "", ""));

        setup_mender_configured(&conn, &config, &platform).unwrap();

        assert_eq!(conn.uploads().len(), 3);
        assert!(conn.ran(
            "DEBIAN_FRONTEND=noninteractive apt --assume-yes install \
             ./mender-auth_4.0.0-1_armhf.deb ./mender-update_4.0.0-1_armhf.deb \
             ./mender-client_4.0.0-1_armhf.deb"
        ));
        assert!(!conn.ran("cp /etc/mender/mender.conf.demo"));
        assert!(conn.ran("echo device_type=raspberrypi3 | tee /var/lib/mender/device_type"));
    }

    #[test]
    fn test_setup_missing_package() {
        let test_dir = tempdir().unwrap();
        let config = config(test_dir.path());
        let conn = MockConnection::new();

        let error =
            setup_mender_configured(&conn, &config, &config.device.platform).unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "invalid-input");
        assert!(!conn.ran("apt --assume-yes install"));
    }
}
