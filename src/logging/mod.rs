use std::{
    cell::RefCell,
    fs::File,
    io::Write,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use harness_api::error::{HarnessError, InitializationError, ReportError};
use osutils::files;

pub(super) mod multilog;
pub(super) mod result_trace;
pub(super) mod run_log;

pub(crate) use result_trace::SCENARIO_RESULT;

/// JSON-lines file shared between a logger and the handle that opens it.
/// Lines written before the file is opened are dropped.
#[derive(Clone, Default)]
struct JsonLines(Arc<Mutex<Option<File>>>);

impl JsonLines {
    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        match self.0.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Truncate `path` and write all further lines to it.
    fn open(&self, path: &Path) -> Result<(), HarnessError> {
        let file = files::create_file(path).structured(InitializationError::SetupLogging)?;
        *self.lock() = Some(file);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn write<T: Serialize>(&self, value: &T) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(file) = self.lock().as_mut() {
            let mut line = serde_json::to_string(value)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    fn flush(&self) {
        if let Some(file) = self.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

thread_local! {
    /// `suite::scenario` running on this thread. Scenarios run on the runner
    /// thread, so records from the script server thread carry none.
    static CURRENT_SCENARIO: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the scenario that subsequent log entries of this thread belong to.
pub fn set_current_scenario(scenario: Option<String>) {
    CURRENT_SCENARIO.with(|current| *current.borrow_mut() = scenario);
}

fn current_scenario() -> Option<String> {
    CURRENT_SCENARIO.with(|current| current.borrow().clone())
}

#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(value: &log::Record) -> Self {
        Self {
            level: value.level().into(),
            message: value.args().to_string(),
            target: value.target().to_string(),
            module: value.module_path().unwrap_or_default().to_string(),
            file: value.file().unwrap_or_default().to_string(),
            line: value.line().unwrap_or_default(),
            scenario: current_scenario(),
        }
    }
}
