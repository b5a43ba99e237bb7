//! Selection and execution of the scenarios.
//!
//! Suites run one after the other, in their declared order. Each gets a fresh
//! environment, either once for the whole suite or once per scenario, and
//! every scenario ends up in the report as passed, failed or skipped.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use log::{error, info, warn};
use url::Url;

use harness_api::{
    config::TestConfig,
    error::{HarnessError, InternalError, ProvisioningError},
};
use osutils::container;

use crate::{
    logging::set_current_scenario,
    provision::Environment,
    report::{Report, ScenarioResult},
    scenarios::{self, Marker, ScenarioContext, ScenarioInstance, Scope, Suite},
    script_server::ScriptServer,
};

/// Which scenarios to run. Empty fields select everything.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    /// Names of the suites to run.
    pub suites: Vec<String>,

    /// Substring of `suite::scenario[param]`.
    pub filter: Option<String>,

    /// Run only suites carrying one of these markers.
    pub markers: Vec<Marker>,
}

/// A suite with the scenarios selected in it.
pub struct PlannedSuite {
    pub suite: &'static Suite,
    pub instances: Vec<ScenarioInstance>,
}

/// Resolve `selection` into the suites to run, in run order. Fails on unknown
/// suite names.
pub fn plan(selection: &Selection) -> Result<Vec<PlannedSuite>, HarnessError> {
    let suites = if selection.suites.is_empty() {
        scenarios::all_suites()
    } else {
        let mut suites = selection
            .suites
            .iter()
            .map(|name| scenarios::find_suite(name))
            .collect::<Result<Vec<_>, _>>()?;
        suites.sort_by_key(|suite| (suite.order, suite.name));
        suites.dedup_by_key(|suite| suite.name);
        suites
    };

    Ok(suites
        .into_iter()
        .filter(|suite| {
            selection.markers.is_empty() || selection.markers.iter().any(|m| suite.has_marker(*m))
        })
        .map(|suite| PlannedSuite {
            suite,
            instances: suite
                .instances()
                .into_iter()
                .filter(|instance| match selection.filter {
                    Some(ref filter) => instance.to_string().contains(filter.as_str()),
                    None => true,
                })
                .collect(),
        })
        .filter(|planned| !planned.instances.is_empty())
        .collect())
}

/// Why the whole suite is skipped, if it is.
fn suite_skip_reason(suite: &Suite, config: &TestConfig) -> Option<&'static str> {
    (suite.has_marker(Marker::Commercial) && !config.commercial_tests)
        .then_some("commercial tests are disabled")
}

/// Run the selected scenarios and report their outcomes. Only failures to
/// set up the run itself are returned as errors.
pub fn run(config: &TestConfig, selection: &Selection) -> Result<Report, HarnessError> {
    let plan = plan(selection)?;
    let total: usize = plan.iter().map(|p| p.instances.len()).sum();
    info!("Running {total} scenario(s) from {} suite(s)", plan.len());

    let needs_script_server = plan
        .iter()
        .any(|p| p.suite.needs_script_server && suite_skip_reason(p.suite, config).is_none());
    let script_server = if needs_script_server {
        let server = ScriptServer::start(config)?;
        server.wait_ready()?;
        Some(server)
    } else {
        None
    };
    let script_url = script_server
        .as_ref()
        .map(ScriptServer::install_script_url)
        .transpose()?;

    let mut report = Report::new();
    for planned in &plan {
        run_suite(config, planned, script_url.as_ref(), &mut report);
    }

    if let Some(server) = script_server {
        if let Err(e) = server.stop() {
            warn!("Failed to stop script server: {e:?}");
        }
    }
    container::remove_all();

    info!("Run {} finished: {}", report.run_id, report.summary());
    Ok(report)
}

fn run_suite(
    config: &TestConfig,
    planned: &PlannedSuite,
    script_url: Option<&Url>,
    report: &mut Report,
) {
    let suite = planned.suite;
    if let Some(reason) = suite_skip_reason(suite, config) {
        info!("Skipping suite '{}': {reason}", suite.name);
        for instance in &planned.instances {
            report.record(ScenarioResult::skipped(suite.name, instance.name(), reason));
        }
        return;
    }

    let mut runnable = Vec::new();
    for instance in &planned.instances {
        match instance.scenario.skip {
            Some(reason) => {
                info!("Skipping {instance}: {reason}");
                report.record(ScenarioResult::skipped(suite.name, instance.name(), reason));
            }
            None => runnable.push(*instance),
        }
    }
    if runnable.is_empty() {
        return;
    }

    info!(
        "Running suite '{}' ({}, {} environment)",
        suite.name, suite.scope, suite.environment
    );
    match suite.scope {
        Scope::PerSuite => match Environment::provision(suite.environment, config) {
            Ok(environment) => {
                for instance in &runnable {
                    report.record(run_scenario(config, &environment, instance, script_url));
                }
                teardown(environment);
            }
            Err(e) => {
                error!("Failed to provision environment of suite '{}': {e:?}", suite.name);
                for instance in &runnable {
                    let error = HarnessError::with_source(
                        ProvisioningError::SuiteEnvironment {
                            suite: suite.name.into(),
                        },
                        anyhow::anyhow!("{e:?}"),
                    );
                    report.record(ScenarioResult::failed(
                        suite.name,
                        instance.name(),
                        Default::default(),
                        error,
                    ));
                }
            }
        },
        Scope::PerScenario => {
            for instance in &runnable {
                let start = Instant::now();
                match Environment::provision(suite.environment, config) {
                    Ok(environment) => {
                        report.record(run_scenario(config, &environment, instance, script_url));
                        teardown(environment);
                    }
                    Err(e) => {
                        error!("Failed to provision environment of {instance}: {e:?}");
                        report.record(ScenarioResult::failed(
                            suite.name,
                            instance.name(),
                            start.elapsed(),
                            e,
                        ));
                    }
                }
            }
        }
    }
}

fn teardown(environment: Environment) {
    let kind = environment.kind();
    if let Err(e) = environment.teardown() {
        warn!("Failed to tear down {kind} environment: {e:?}");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        format!("{payload:?}")
    }
}

/// Run one scenario in `environment`. Panics of the scenario are reported as
/// internal errors.
fn run_scenario(
    config: &TestConfig,
    environment: &Environment,
    instance: &ScenarioInstance,
    script_url: Option<&Url>,
) -> ScenarioResult {
    set_current_scenario(Some(instance.to_string()));
    info!("Running {instance}");

    let ctx = ScenarioContext {
        conn: environment.connection().ok(),
        config,
        platform: environment.platform(),
        script_url,
        param: instance.param,
    };

    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (instance.scenario.run)(&ctx)))
        .unwrap_or_else(|payload| {
            Err(HarnessError::new(InternalError::Panic(panic_message(
                payload,
            ))))
        });
    let duration = start.elapsed();

    let result = match result {
        Ok(()) => {
            info!("PASSED {instance} in {:.1}s", duration.as_secs_f64());
            ScenarioResult::passed(instance.suite.name, instance.name(), duration)
        }
        Err(e) => {
            error!("FAILED {instance} in {:.1}s: {e:?}", duration.as_secs_f64());
            ScenarioResult::failed(instance.suite.name, instance.name(), duration, e)
        }
    };

    set_current_scenario(None);
    result
}

#[cfg(test)]
mod tests {
    use harness_api::error::AssertionError;

    use crate::{provision::EnvironmentKind, report::Outcome};

    use super::*;

    fn names(plan: &[PlannedSuite]) -> Vec<&'static str> {
        plan.iter().map(|p| p.suite.name).collect()
    }

    #[test]
    fn test_plan_everything() {
        let plan = plan(&Selection::default()).unwrap();
        assert_eq!(names(&plan).first(), Some(&"versions"));
        assert_eq!(names(&plan).last(), Some(&"orchestrator"));
    }

    #[test]
    fn test_plan_suites() {
        let selection = Selection {
            suites: vec!["orchestrator".into(), "addons".into(), "addons".into()],
            ..Default::default()
        };
        assert_eq!(names(&plan(&selection).unwrap()), ["addons", "orchestrator"]);

        let selection = Selection {
            suites: vec!["mender-shell".into()],
            ..Default::default()
        };
        assert_eq!(
            plan(&selection).err().unwrap().kind().to_string(),
            "Unknown suite 'mender-shell'"
        );
    }

    #[test]
    fn test_plan_filter() {
        let selection = Selection {
            filter: Some("default[stable]".into()),
            ..Default::default()
        };
        let plan = plan(&selection).unwrap();
        assert_eq!(names(&plan), ["install-script", "install-script-legacy"]);
        assert!(plan
            .iter()
            .all(|p| p.instances.len() == 1 && p.instances[0].param == Some("stable")));
    }

    #[test]
    fn test_plan_markers() {
        let selection = Selection {
            markers: vec![Marker::Commercial],
            ..Default::default()
        };
        assert_eq!(names(&plan(&selection).unwrap()), ["gateway", "orchestrator"]);
    }

    #[test]
    fn test_commercial_skipped() {
        let selection = Selection {
            suites: vec!["gateway".into()],
            ..Default::default()
        };
        let report = run(&TestConfig::default(), &selection).unwrap();
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(
            report.results[0].reason.as_deref(),
            Some("commercial tests are disabled")
        );
    }

    #[test]
    fn test_run_versions() {
        let mut config = TestConfig::default();
        config.versions.mender_client = Some("4.0.0".into());
        config
            .package_versions
            .insert("mender-client".into(), "4.0.1-1".into());

        let selection = Selection {
            suites: vec!["versions".into()],
            ..Default::default()
        };
        let report = run(&config, &selection).unwrap();
        assert_eq!(report.totals.passed, 2);
        assert_eq!(report.totals.failed, 1);

        let failed = &report.results[0];
        assert_eq!(failed.scenario, "mender-client");
        assert_eq!(failed.outcome, Outcome::Failed);
        assert_eq!(
            failed.error.as_ref().unwrap().kind(),
            &harness_api::error::ErrorKind::Assertion(AssertionError::VersionMismatch {
                version: "4.0.0".into(),
                deb_version: "4.0.1-1".into(),
            })
        );
    }

    #[test]
    fn test_panic_is_internal_error() {
        fn panicking(_: &ScenarioContext) -> Result<(), HarnessError> {
            panic!("scenario bug");
        }
        static SUITE: Suite = Suite {
            name: "panicking",
            description: "",
            environment: EnvironmentKind::Host,
            scope: Scope::PerSuite,
            markers: &[],
            order: 0,
            needs_script_server: false,
            scenarios: &[scenarios::Scenario::new("panics", panicking)],
        };

        let config = TestConfig::default();
        let environment = Environment::provision(EnvironmentKind::Host, &config).unwrap();
        let instance = SUITE.instances()[0];
        let result = run_scenario(&config, &environment, &instance, None);

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(
            result.error.unwrap().kind().to_string(),
            "Scenario panicked: scenario bug"
        );
    }
}
