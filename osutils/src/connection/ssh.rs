use std::path::{Path, PathBuf};

use harness_api::{constants::SSH_CONNECT_TIMEOUT_SECS, error::HarnessError};

use crate::dependencies::{Command, Dependency, DependencyResultExt};

use super::{CommandResult, Connection};

/// Exit code `ssh` uses for its own errors, as opposed to the remote command's.
pub const SSH_ERROR_EXIT_CODE: i32 = 255;

/// Where and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub key: PathBuf,
}

impl SshTarget {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options shared by `ssh` and `scp`. The emulated board gets a new host
    /// key every time it is provisioned, so host keys are never recorded.
    fn options(&self) -> Vec<String> {
        vec![
            "-i".into(),
            self.key.display().to_string(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            format!("ConnectTimeout={SSH_CONNECT_TIMEOUT_SECS}"),
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
        ]
    }
}

/// Connection to a host over SSH, as an unprivileged user.
#[derive(Debug, Clone)]
pub struct SshConnection {
    target: SshTarget,
}

impl SshConnection {
    pub fn new(target: SshTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    fn ssh_command(&self, command: &str) -> Command {
        Dependency::Ssh
            .cmd()
            .with_arg("-p")
            .with_arg(self.target.port.to_string())
            .with_args(self.target.options())
            .with_arg(self.target.destination())
            .with_arg(command)
    }

    fn scp_command(&self, source: &Path, destination: Option<&str>) -> Command {
        Dependency::Scp
            .cmd()
            .with_arg("-P")
            .with_arg(self.target.port.to_string())
            .with_args(self.target.options())
            .with_arg(source)
            .with_arg(format!(
                "{}:{}",
                self.target.destination(),
                destination.unwrap_or_default()
            ))
    }
}

/// Whether `result` reports a failure of `ssh` itself, e.g. a refused or
/// reset connection, rather than of the remote command.
pub fn is_connection_error(result: &CommandResult) -> bool {
    result.exit_code == Some(SSH_ERROR_EXIT_CODE)
}

impl Connection for SshConnection {
    fn execute(&self, command: &str) -> Result<CommandResult, HarnessError> {
        self.ssh_command(command)
            .output()
            .map_err(|e| HarnessError::from(*e))
    }

    fn put(&self, source: &Path, destination: Option<&str>) -> Result<(), HarnessError> {
        self.scp_command(source, destination)
            .run_and_check()
            .message(format!(
                "Failed to copy '{}' to {}",
                source.display(),
                self.describe()
            ))
    }

    fn needs_sudo(&self) -> bool {
        self.target.user != "root"
    }

    fn describe(&self) -> String {
        format!(
            "{}@{}:{}",
            self.target.user, self.target.host, self.target.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SshTarget {
        SshTarget {
            host: "localhost".into(),
            port: 5555,
            user: "pi".into(),
            key: "docker-files/ssh-keys/key".into(),
        }
    }

    #[test]
    fn test_ssh_command() {
        let conn = SshConnection::new(target());
        assert_eq!(
            conn.ssh_command("dpkg --status mender-client").render_command(),
            "ssh -p 5555 -i docker-files/ssh-keys/key -o StrictHostKeyChecking=no \
             -o UserKnownHostsFile=/dev/null -o ConnectTimeout=30 -o BatchMode=yes \
             -o LogLevel=ERROR pi@localhost 'dpkg --status mender-client'"
        );
        assert!(conn.needs_sudo());
        assert_eq!(conn.describe(), "pi@localhost:5555");
    }

    #[test]
    fn test_scp_command() {
        let conn = SshConnection::new(target());
        let rendered = conn
            .scp_command(Path::new("output/mender-client.deb"), None)
            .render_command();
        assert!(rendered.starts_with("scp -P 5555 -i docker-files/ssh-keys/key "));
        assert!(rendered.ends_with(" output/mender-client.deb pi@localhost:"));

        let rendered = conn
            .scp_command(Path::new("a.deb"), Some("/tmp/a.deb"))
            .render_command();
        assert!(rendered.ends_with(" a.deb pi@localhost:/tmp/a.deb"));
    }

    #[test]
    fn test_root_needs_no_sudo() {
        let conn = SshConnection::new(SshTarget {
            user: "root".into(),
            ..target()
        });
        assert!(!conn.needs_sudo());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(is_connection_error(&CommandResult::new(
            255,
            "",
            "kex_exchange_identification: read: Connection reset by peer"
        )));
        assert!(!is_connection_error(&CommandResult::new(1, "", "")));
    }
}
