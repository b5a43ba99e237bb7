use std::path::Path;

use log::{Log, Metadata, Record};

use harness_api::error::HarnessError;

use super::{JsonLines, LogEntry};

/// Log of the whole run: every record as a JSON line, tagged with the
/// scenario that was running.
///
/// The logger is registered at startup, before the configuration naming the
/// file is loaded. Clones share the file, so the one kept by `main` opens it
/// for the one registered with the [`MultiLogger`](super::multilog::MultiLogger).
#[derive(Clone, Default)]
pub struct RunLog {
    file: JsonLines,
}

impl RunLog {
    /// Start logging to `path`. A previous run's log there is truncated.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        self.file.open(path.as_ref())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    pub fn make_logger(&self) -> Box<dyn Log> {
        Box::new(self.clone())
    }
}

impl Log for RunLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        self.file.is_open()
    }

    fn log(&self, record: &Record) {
        // Best effort
        let _ = self.file.write(&LogEntry::from(record));
    }

    fn flush(&self) {
        self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use log::Level;
    use tempfile::tempdir;

    use osutils::files;

    use crate::logging::{set_current_scenario, Level as EntryLevel};

    use super::*;

    fn entries(path: &Path) -> Vec<LogEntry> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_opened_later() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("logs").join("run.jsonl");
        files::write_file(&path, 0o600, b"{\"message\":\"previous run\"}\n").unwrap();

        let run_log = RunLog::default();
        let logger = run_log.make_logger();
        assert!(!logger.enabled(&Metadata::builder().level(Level::Error).build()));
        logger.log(
            &Record::builder()
                .args(format_args!("Dist-tester version: 0.1.0"))
                .build(),
        );

        run_log.open(&path).unwrap();
        assert!(logger.enabled(&Metadata::builder().level(Level::Trace).build()));
        logger.log(
            &Record::builder()
                .args(format_args!("Running 3 scenario(s) from 1 suite(s)"))
                .build(),
        );
        logger.flush();

        let entries = entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Running 3 scenario(s) from 1 suite(s)");
    }

    #[test]
    fn test_unwritable_path() {
        let test_dir = tempdir().unwrap();
        // A directory cannot be opened as the log
        let error = RunLog::default().open(test_dir.path()).unwrap_err();
        assert_eq!(error.kind().to_string(), "Failed to set up logging");
    }

    #[test]
    fn test_tags_scenario() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("run.jsonl");
        let run_log = RunLog::default();
        run_log.open(&path).unwrap();
        let logger = run_log.make_logger();

        logger.log(
            &Record::builder()
                .args(format_args!("Running suite 'addons'"))
                .build(),
        );
        set_current_scenario(Some("addons::mender-connect".into()));
        logger.log(
            &Record::builder()
                .args(format_args!("Installing mender-connect"))
                .level(Level::Debug)
                .target("dist_tester::scenarios")
                .module_path(Some("dist_tester::scenarios::addons"))
                .file(Some(file!()))
                .line(Some(42))
                .build(),
        );
        set_current_scenario(None);
        logger.flush();

        let entries = entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].scenario, None);

        let entry = &entries[1];
        assert_eq!(entry.level, EntryLevel::Debug);
        assert_eq!(entry.message, "Installing mender-connect");
        assert_eq!(entry.module, "dist_tester::scenarios::addons");
        assert_eq!(entry.line, 42);
        assert_eq!(entry.scenario.as_deref(), Some("addons::mender-connect"));
    }
}
