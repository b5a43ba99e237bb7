use std::path::Path;

use harness_api::error::HarnessError;

use crate::{container, dependencies::Dependency};

use super::{CommandResult, Connection};

/// Default destination of [`Connection::put`] in a container.
const DEFAULT_DESTINATION: &str = "/";

/// Connection to a running container through `docker exec`. Commands run as
/// root.
#[derive(Debug, Clone)]
pub struct DockerConnection {
    id: String,
}

impl DockerConnection {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Connection for DockerConnection {
    fn execute(&self, command: &str) -> Result<CommandResult, HarnessError> {
        Dependency::Docker
            .cmd()
            .args(["exec", self.id.as_str(), "/bin/bash", "-c", command])
            .output()
            .map_err(|e| HarnessError::from(*e))
    }

    fn put(&self, source: &Path, destination: Option<&str>) -> Result<(), HarnessError> {
        container::copy_into(
            &self.id,
            source,
            destination.unwrap_or(DEFAULT_DESTINATION),
        )
    }

    fn needs_sudo(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("docker:{}", self.id.get(..12).unwrap_or(&self.id))
    }
}


#[cfg(all(test, feature = "functional-test"))]
mod functional_test {
    use std::io::Write;

    use crate::container::{self, RunOptions};

    use super::*;

    #[test]
    fn test_execute_and_put() {
        let id = container::run(
            "debian:bookworm",
            &RunOptions {
                host_network: true,
                interactive: true,
                auto_remove: true,
            },
        )
        .unwrap();
        let conn = DockerConnection::new(&id);

        let result = conn.execute("echo out; echo err >&2; exit 3").unwrap();
        assert_eq!(result, CommandResult::new(3, "out\n", "err\n"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"contents").unwrap();
        conn.put(file.path(), Some("/tmp/uploaded")).unwrap();
        assert_eq!(conn.run("cat /tmp/uploaded").unwrap().stdout, "contents");

        container::remove(&id).unwrap();
    }
}
