use std::time::Duration;

use log::{debug, info};

use harness_api::{
    config::TestConfig,
    error::{HarnessError, ProvisioningError, ReportError},
};
use osutils::{
    connection::{
        ssh::{self, SshConnection, SshTarget},
        Connection,
    },
    container::{self, RunOptions},
};
use sysdefs::distro::TargetPlatform;

use crate::polling;

use super::{Disposal, Environment, EnvironmentKind};

const CONNECTION_RESET: &str = "Connection reset by peer";

/// Boot the emulated board and log in to it.
pub(super) fn provision(
    config: &TestConfig,
    platform: TargetPlatform,
) -> Result<Environment, HarnessError> {
    let device = &config.device;
    let id = container::run(
        &device.image,
        &RunOptions {
            host_network: true,
            interactive: false,
            auto_remove: true,
        },
    )?;
    let mut environment =
        Environment::with_container(EnvironmentKind::Raspbian, platform, id.clone(), Disposal::Stop);

    let (timeout, interval) = config.timeouts.boot();
    wait_for_boot(&id, &device.boot_banner, timeout, interval)?;

    let conn = SshConnection::new(SshTarget {
        host: device.ssh_host.clone(),
        port: device.ssh_port,
        user: device.ssh_user.clone(),
        key: device.ssh_key.clone(),
    });
    let (timeout, interval) = config.timeouts.ssh_login();
    wait_for_ssh(&conn, timeout, interval)?;

    environment.conn = Some(Box::new(conn));
    Ok(environment)
}

/// Watch the serial console for the login banner.
fn wait_for_boot(
    id: &str,
    banner: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), HarnessError> {
    info!("Waiting up to {}s for the board to boot", timeout.as_secs());
    polling::wait_until(timeout, interval, || {
        Ok(container::logs(id)?.contains(banner).then_some(()))
    })?
    .structured(ProvisioningError::BootTimeout {
        timeout_secs: timeout.as_secs(),
    })?;

    debug!("Board in container '{id}' booted");
    Ok(())
}

/// Run `true` until the SSH daemon of the board accepts the login. sshd
/// comes up after the console, and refuses or resets the first connections.
/// Any other failure ends the wait.
fn wait_for_ssh(
    conn: &dyn Connection,
    timeout: Duration,
    interval: Duration,
) -> Result<(), HarnessError> {
    polling::wait_until(timeout, interval, || {
        let result = conn.execute("true")?;
        if result.success() {
            return Ok(Some(()));
        }

        if ssh::is_connection_error(&result) || result.stderr.contains(CONNECTION_RESET) {
            debug!("SSH not ready yet: {}", result.stderr.trim());
            return Ok(None);
        }
        Err(HarnessError::with_source(
            ProvisioningError::SshUnreachable {
                host: conn.describe(),
            },
            anyhow::anyhow!("ssh {}: {}", result.explain_exit(), result.stderr.trim()),
        ))
    })?
    .structured(ProvisioningError::SshUnreachable {
        host: conn.describe(),
    })?;

    info!("Logged in to {}", conn.describe());
    Ok(())
}

#[cfg(test)]
mod tests {
    use osutils::connection::{mock::MockConnection, CommandResult};

    use super::*;

    #[test]
    fn test_wait_for_ssh() {
        let conn = MockConnection::new();
        conn.respond_once(
            "true",
            CommandResult::new(255, "", "kex_exchange_identification: Connection reset by peer"),
        );

        wait_for_ssh(&conn, Duration::from_secs(5), Duration::ZERO).unwrap();
        assert_eq!(conn.commands(), vec!["true", "true"]);
    }

    #[test]
    fn test_wait_for_ssh_reset_by_remote_shell() {
        let conn = MockConnection::new();
        conn.respond_once(
            "true",
            CommandResult::new(1, "", "read: Connection reset by peer"),
        );

        wait_for_ssh(&conn, Duration::from_secs(5), Duration::ZERO).unwrap();
        assert_eq!(conn.commands(), vec!["true", "true"]);
    }

    #[test]
    fn test_wait_for_ssh_timeout() {
        let conn = MockConnection::new();
        conn.respond("true", CommandResult::new(255, "", "Connection refused"));

        let error = wait_for_ssh(&conn, Duration::ZERO, Duration::ZERO).unwrap_err();
        assert_eq!(
            error.kind().to_string(),
            "SSH connection to 'mock' could not be established"
        );
    }

    #[test]
    fn test_wait_for_ssh_fails_fast() {
        let conn = MockConnection::new();
        conn.respond(
            "true",
            CommandResult::new(1, "", "This account is currently not available."),
        );

        let error = wait_for_ssh(&conn, Duration::from_secs(60), Duration::ZERO).unwrap_err();
        assert_eq!(
            error.kind().to_string(),
            "SSH connection to 'mock' could not be established"
        );
        assert_eq!(conn.commands(), vec!["true"]);
    }
}
