use std::{collections::BTreeSet, path::Path, sync::Mutex};

use duct::cmd;
use lazy_static::lazy_static;
use log::{debug, warn};

use harness_api::error::{
    ExecutionError, HarnessError, ProvisioningError, ReportError,
};

use crate::dependencies::{Dependency, DependencyResultExt};

lazy_static! {
    /// Containers started by this process and not yet removed. Only used to
    /// clean up after scenarios that did not tear down their environment.
    static ref LIVE_CONTAINERS: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());
}

/// Options for `docker run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Share the network namespace of the host.
    pub host_network: bool,

    /// Allocate a pseudo-TTY and keep stdin open so that the default shell of
    /// plain distribution images keeps running.
    pub interactive: bool,

    /// Remove the container when it stops.
    pub auto_remove: bool,
}

impl RunOptions {
    fn args(&self) -> Vec<&'static str> {
        let mut args = vec!["run"];
        if self.host_network {
            args.push("--network=host");
        }
        if self.auto_remove {
            args.push("--rm");
        }
        if self.interactive {
            args.push("-ti");
        }
        args.push("-d");
        args
    }
}

/// Start a detached container and return its ID. The container is recorded
/// until it is stopped or removed through this module.
pub fn run(image: &str, options: &RunOptions) -> Result<String, HarnessError> {
    let output = Dependency::Docker
        .cmd()
        .with_args(options.args())
        .with_arg(image)
        .output_and_check()
        .message(format!("Failed to start container from '{image}'"))?;

    let id = output
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|id| !id.is_empty())
        .structured(ProvisioningError::StartContainer {
            image: image.into(),
        })?;

    debug!("Started container '{id}' from image '{image}'");
    register(&id);
    Ok(id)
}

/// Combined stdout and stderr of the container. Fails once the container has
/// exited and been removed.
pub fn logs(id: &str) -> Result<String, HarnessError> {
    let output = cmd!(Dependency::Docker.name(), "logs", id)
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()
        .structured(ExecutionError::CommandCouldNotExecute {
            binary: Dependency::Docker.name(),
        })?;

    checked_logs(
        id,
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

fn checked_logs(id: &str, success: bool, text: String) -> Result<String, HarnessError> {
    if success {
        return Ok(text);
    }
    Err(HarnessError::with_source(
        ProvisioningError::ContainerGone { id: id.into() },
        anyhow::anyhow!("docker logs: {}", text.trim()),
    ))
}

/// Copy a host file into the container.
pub fn copy_into(id: &str, source: &Path, destination: &str) -> Result<(), HarnessError> {
    Dependency::Docker
        .cmd()
        .with_arg("cp")
        .with_arg(source)
        .with_arg(format!("{id}:{destination}"))
        .run_and_check()
        .structured(ExecutionError::CopyFailed {
            source_path: source.display().to_string(),
            destination: format!("{id}:{destination}"),
        })
}

/// Stop the container. Containers started with `auto_remove` disappear.
pub fn stop(id: &str) -> Result<(), HarnessError> {
    Dependency::Docker
        .cmd()
        .with_arg("stop")
        .with_arg(id)
        .run_and_check()
        .structured(ProvisioningError::Teardown { id: id.into() })?;
    unregister(id);
    Ok(())
}

/// Forcefully remove the container.
pub fn remove(id: &str) -> Result<(), HarnessError> {
    Dependency::Docker
        .cmd()
        .args(["rm", "-f", id])
        .run_and_check()
        .structured(ProvisioningError::Teardown { id: id.into() })?;
    unregister(id);
    Ok(())
}

/// IDs of the containers started by this process that are still around.
pub fn live_containers() -> Vec<String> {
    match LIVE_CONTAINERS.lock() {
        Ok(set) => set.iter().cloned().collect(),
        Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
    }
}

/// Remove every container still recorded. Errors are logged, not returned,
/// so that one stuck container does not keep the others around.
pub fn remove_all() {
    for id in live_containers() {
        if let Err(e) = remove(&id) {
            warn!("Failed to remove leftover container '{id}': {e:?}");
            unregister(&id);
        }
    }
}

pub(crate) fn register(id: &str) {
    let mut set = match LIVE_CONTAINERS.lock() {
        Ok(set) => set,
        Err(poisoned) => poisoned.into_inner(),
    };
    set.insert(id.to_string());
}

pub(crate) fn unregister(id: &str) {
    let mut set = match LIVE_CONTAINERS.lock() {
        Ok(set) => set,
        Err(poisoned) => poisoned.into_inner(),
    };
    set.remove(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options() {
        let options = RunOptions {
            host_network: true,
            interactive: true,
            auto_remove: true,
        };
        assert_eq!(options.args(), vec!["run", "--network=host", "--rm", "-ti", "-d"]);

        assert_eq!(RunOptions::default().args(), vec!["run", "-d"]);
    }

    #[test]
    fn test_checked_logs() {
        assert_eq!(
            checked_logs("3f2a9c1b7d4e", true, "Booting Linux on physical CPU 0x0\n".into())
                .unwrap(),
            "Booting Linux on physical CPU 0x0\n"
        );

        let error = checked_logs(
            "3f2a9c1b7d4e",
            false,
            "Error response from daemon: No such container: 3f2a9c1b7d4e\n".into(),
        )
        .unwrap_err();
        assert_eq!(error.kind().to_string(), "Container '3f2a9c1b7d4e' is gone");
        assert_eq!(<&str>::from(error.kind()), "provisioning");
    }

    #[test]
    fn test_registry() {
        register("0123456789ab");
        register("ba9876543210");
        assert!(live_containers().contains(&"0123456789ab".to_string()));

        unregister("0123456789ab");
        unregister("ba9876543210");
        assert!(!live_containers().contains(&"0123456789ab".to_string()));
        assert!(!live_containers().contains(&"ba9876543210".to_string()));
    }
}
