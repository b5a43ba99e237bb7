//! Scripted connection for unit tests of scenario logic.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use harness_api::error::HarnessError;

use super::{CommandResult, Connection};

struct Rule {
    pattern: String,
    result: CommandResult,
    once: bool,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    commands: Vec<String>,
    uploads: Vec<(PathBuf, Option<String>)>,
}

/// Connection that records every command and answers from a list of rules.
///
/// A rule matches when its pattern is a substring of the command. Rules are
/// tried in the order they were added; commands matching no rule succeed
/// with empty output.
#[derive(Default)]
pub struct MockConnection {
    state: Mutex<State>,
    sudo: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like an unprivileged SSH login.
    pub fn with_sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    /// Answer every command containing `pattern` with `result`.
    pub fn respond(&self, pattern: &str, result: CommandResult) -> &Self {
        self.add_rule(pattern, result, false)
    }

    /// Answer the next command containing `pattern` with `result`.
    pub fn respond_once(&self, pattern: &str, result: CommandResult) -> &Self {
        self.add_rule(pattern, result, true)
    }

    /// Answer every command containing `pattern` with a successful `stdout`.
    pub fn respond_stdout(&self, pattern: &str, stdout: &str) -> &Self {
        self.respond(pattern, CommandResult::new(0, stdout, ""))
    }

    fn add_rule(&self, pattern: &str, result: CommandResult, once: bool) -> &Self {
        self.state.lock().unwrap().rules.push(Rule {
            pattern: pattern.into(),
            result,
            once,
        });
        self
    }

    /// Every command executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Whether any executed command contains `pattern`.
    pub fn ran(&self, pattern: &str) -> bool {
        self.commands().iter().any(|c| c.contains(pattern))
    }

    /// Every file copied so far, with its requested destination.
    pub fn uploads(&self) -> Vec<(PathBuf, Option<String>)> {
        self.state.lock().unwrap().uploads.clone()
    }
}

impl Connection for MockConnection {
    fn execute(&self, command: &str) -> Result<CommandResult, HarnessError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.into());

        let Some(index) = state
            .rules
            .iter()
            .position(|rule| command.contains(&rule.pattern))
        else {
            return Ok(CommandResult::new(0, "", ""));
        };

        if state.rules[index].once {
            Ok(state.rules.remove(index).result)
        } else {
            Ok(state.rules[index].result.clone())
        }
    }

    fn put(&self, source: &Path, destination: Option<&str>) -> Result<(), HarnessError> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push((source.to_path_buf(), destination.map(String::from)));
        Ok(())
    }

    fn needs_sudo(&self) -> bool {
        self.sudo
    }

    fn describe(&self) -> String {
        "mock".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules() {
        let conn = MockConnection::new();
        conn.respond_once("dpkg --status", CommandResult::new(1, "", "not installed"))
            .respond_stdout("dpkg --status", "Status: install ok installed\n");

        assert_eq!(
            conn.execute("dpkg --status mender-client").unwrap().exit_code,
            Some(1)
        );
        assert_eq!(
            conn.execute("dpkg --status mender-client").unwrap().stdout,
            "Status: install ok installed\n"
        );
        assert!(conn.execute("uname -a").unwrap().success());
        assert!(conn.ran("uname"));
        assert!(!conn.ran("reboot"));
    }

    #[test]
    fn test_uploads() {
        let conn = MockConnection::new();
        conn.put(Path::new("a.deb"), None).unwrap();
        conn.put(Path::new("b.deb"), Some("/packages")).unwrap();
        assert_eq!(
            conn.uploads(),
            vec![
                (PathBuf::from("a.deb"), None),
                (PathBuf::from("b.deb"), Some("/packages".into())),
            ]
        );
    }
}
