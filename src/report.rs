//! Outcome of a test run, as written to `--report`.

use std::{fs, path::Path, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};
use uuid::Uuid;

use harness_api::error::{HarnessError, InitializationError, InternalError, ReportError};

use crate::logging::SCENARIO_RESULT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioResult {
    pub suite: String,
    pub scenario: String,
    pub outcome: Outcome,

    /// Why the scenario was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub duration_secs: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HarnessError>,
}

impl ScenarioResult {
    pub fn passed(suite: &str, scenario: String, duration: Duration) -> Self {
        Self {
            suite: suite.into(),
            scenario,
            outcome: Outcome::Passed,
            reason: None,
            duration_secs: duration.as_secs_f64(),
            error: None,
        }
    }

    pub fn failed(suite: &str, scenario: String, duration: Duration, error: HarnessError) -> Self {
        Self {
            suite: suite.into(),
            scenario,
            outcome: Outcome::Failed,
            reason: None,
            duration_secs: duration.as_secs_f64(),
            error: Some(error),
        }
    }

    pub fn skipped(suite: &str, scenario: String, reason: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            scenario,
            outcome: Outcome::Skipped,
            reason: Some(reason.into()),
            duration_secs: 0.0,
            error: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ScenarioResult>,
    pub totals: Totals,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            results: Vec::new(),
            totals: Totals::default(),
        }
    }

    /// Add `result` to the report and emit it as a `scenario_result` event.
    pub fn record(&mut self, result: ScenarioResult) {
        tracing::info!(
            metric_name = SCENARIO_RESULT,
            run_id = %self.run_id,
            suite = result.suite.as_str(),
            scenario = result.scenario.as_str(),
            outcome = <&str>::from(result.outcome),
            duration_secs = result.duration_secs,
            category = result.error.as_ref().map(|e| <&str>::from(e.kind())),
        );

        match result.outcome {
            Outcome::Passed => self.totals.passed += 1,
            Outcome::Failed => self.totals.failed += 1,
            Outcome::Skipped => self.totals.skipped += 1,
        }
        self.results.push(result);
    }

    /// Whether no scenario failed.
    pub fn success(&self) -> bool {
        self.totals.failed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} skipped",
            self.totals.passed, self.totals.failed, self.totals.skipped
        )
    }

    /// Serialize the report as JSON for a `.json` path, as YAML otherwise.
    pub fn render(&self, path: &Path) -> Result<String, HarnessError> {
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::to_string_pretty(self).structured(InternalError::SerializeReport)
        } else {
            serde_yaml::to_string(self).structured(InternalError::SerializeReport)
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), HarnessError> {
        let contents = self.render(path)?;
        fs::write(path, contents).structured(InitializationError::WriteReport {
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use harness_api::error::AssertionError;
    use tempfile::tempdir;

    use super::*;

    fn report() -> Report {
        let mut report = Report::new();
        report.record(ScenarioResult::passed(
            "addons",
            "mender-connect".into(),
            Duration::from_millis(1500),
        ));
        report.record(ScenarioResult::failed(
            "addons",
            "mender-configure".into(),
            Duration::from_secs(2),
            HarnessError::new(AssertionError::PackageNotInstalled {
                package: "mender-configure".into(),
            }),
        ));
        report.record(ScenarioResult::skipped(
            "gateway",
            "mender-gateway".into(),
            "commercial tests are disabled",
        ));
        report
    }

    #[test]
    fn test_totals() {
        let report = report();
        assert_eq!(
            report.totals,
            Totals {
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert!(!report.success());
        assert_eq!(report.summary(), "1 passed, 1 failed, 1 skipped");
        assert!(Report::new().success());
    }

    #[test]
    fn test_render_yaml() {
        let rendered = report().render(Path::new("report.yaml")).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();

        assert_eq!(value["totals"]["failed"], 1);
        let failed = &value["results"][1];
        assert_eq!(failed["outcome"], "failed");
        assert_eq!(failed["duration-secs"], 2.0);
        assert_eq!(failed["error"]["category"], "assertion");
        assert_eq!(
            failed["error"]["message"],
            "Package 'mender-configure' is not installed"
        );
        assert_eq!(value["results"][2]["reason"], "commercial tests are disabled");
        assert!(value["results"][0].get("error").is_none());
    }

    #[test]
    fn test_write_json() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("report.JSON");
        let report = report();
        report.write(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run-id"], report.run_id.to_string());
        assert_eq!(value["results"][0]["outcome"], "passed");
        assert!(DateTime::parse_from_rfc3339(value["started-at"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_write_error() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("missing").join("report.yaml");

        let error = report().write(&path).unwrap_err();
        assert_eq!(<&str>::from(error.kind()), "initialization");
    }
}
