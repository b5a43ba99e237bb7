use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{
    field::{Field, Visit},
    subscriber::Interest,
    Event, Subscriber,
};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use harness_api::error::HarnessError;

use crate::DIST_TESTER_VERSION;

use super::JsonLines;

/// `metric_name` of the events emitted for every recorded scenario result.
pub const SCENARIO_RESULT: &str = "scenario_result";

#[derive(Default)]
struct FieldVisitor {
    fields: BTreeMap<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), json!(format!("{value:?}")));
    }
}

/// Fields of a `scenario_result` event.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ScenarioFields {
    run_id: String,
    suite: String,
    scenario: String,
    outcome: String,
    duration_secs: f64,

    /// Category of the error of a failed scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultRecord {
    timestamp: DateTime<Utc>,
    dist_tester_version: String,
    #[serde(flatten)]
    result: ScenarioFields,
}

/// Layer appending one JSON line per `scenario_result` event to a file, so
/// that the results of a run that never writes its report survive. Other
/// events are ignored.
///
/// Like [`RunLog`](super::run_log::RunLog), the layer is installed before the
/// file is known, and clones share the file.
#[derive(Clone, Default)]
pub struct ResultTrace {
    file: JsonLines,
}

impl ResultTrace {
    /// Start writing to `path`, truncating it.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        self.file.open(path.as_ref())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }
}

impl<S> Layer<S> for ResultTrace
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn register_callsite(&self, _metadata: &'static tracing::Metadata<'static>) -> Interest {
        // Whether the file is open changes at runtime
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &tracing::Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.file.is_open() && metadata.is_event() && metadata.level() <= &tracing::Level::INFO
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if visitor.fields.remove("metric_name") != Some(json!(SCENARIO_RESULT)) {
            return;
        }
        let result: ScenarioFields =
            match serde_json::from_value(Value::Object(Map::from_iter(visitor.fields))) {
                Ok(result) => result,
                Err(e) => {
                    trace!("Malformed scenario result event: {e}");
                    return;
                }
            };

        let record = ResultRecord {
            timestamp: Utc::now(),
            dist_tester_version: DIST_TESTER_VERSION.into(),
            result,
        };
        if let Err(e) = self.file.write(&record) {
            trace!("Failed to write scenario result: {e}");
        }
        self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use tempfile::tempdir;
    use tracing_subscriber::layer::SubscriberExt;

    use crate::report::{Report, ScenarioResult};

    use super::*;

    fn records(path: &Path) -> Vec<ResultRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_records_report_results() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("results.jsonl");
        let result_trace = ResultTrace::default();
        result_trace.open(&path).unwrap();
        let subscriber = tracing_subscriber::Registry::default().with(result_trace);

        let mut report = Report::new();
        tracing::subscriber::with_default(subscriber, || {
            report.record(ScenarioResult::passed(
                "addons",
                "mender-connect".into(),
                Duration::from_millis(1500),
            ));
            report.record(ScenarioResult::failed(
                "versions",
                "mender-client".into(),
                Duration::from_secs(2),
                HarnessError::assertion("mismatch"),
            ));
            report.record(ScenarioResult::skipped(
                "gateway",
                "install".into(),
                "commercial tests are disabled",
            ));
        });

        let records = records(&path);
        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.dist_tester_version == DIST_TESTER_VERSION));

        assert_eq!(
            records[0].result,
            ScenarioFields {
                run_id: report.run_id.to_string(),
                suite: "addons".into(),
                scenario: "mender-connect".into(),
                outcome: "passed".into(),
                duration_secs: 1.5,
                category: None,
            }
        );
        assert_eq!(records[1].result.outcome, "failed");
        assert_eq!(records[1].result.category.as_deref(), Some("assertion"));
        assert_eq!(records[2].result.outcome, "skipped");
        assert_eq!(records[2].result.duration_secs, 0.0);
    }

    #[test]
    fn test_ignores_other_events() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("results.jsonl");
        let result_trace = ResultTrace::default();
        let subscriber = tracing_subscriber::Registry::default().with(result_trace.clone());

        tracing::subscriber::with_default(subscriber, || {
            // Not open yet
            Report::new().record(ScenarioResult::skipped(
                "gateway",
                "install".into(),
                "disabled",
            ));

            result_trace.open(&path).unwrap();
            tracing::info!("Running suite 'addons'");
            tracing::info!(metric_name = "suite_count", value = 3.0);
            tracing::info!(metric_name = SCENARIO_RESULT, suite = "addons");
            tracing::debug!(
                metric_name = SCENARIO_RESULT,
                run_id = "r",
                suite = "addons",
                scenario = "mender-connect",
                outcome = "passed",
                duration_secs = 1.0,
            );
        });

        assert!(records(&path).is_empty());
    }

    #[test]
    fn test_unwritable_path() {
        let test_dir = tempdir().unwrap();
        let result_trace = ResultTrace::default();
        assert!(result_trace.open(test_dir.path()).is_err());
        assert!(!result_trace.is_open());
    }
}
