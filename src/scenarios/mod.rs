//! Test scenarios, grouped in suites.
//!
//! Each suite registers itself with `inventory` and declares what it needs:
//! the kind of environment, whether a fresh one is provisioned for every
//! scenario or shared by the whole suite, its markers and its place in the
//! run order. Scenarios are plain functions over a [`ScenarioContext`].

use std::fmt::{self, Display};

use serde::Serialize;
use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};
use url::Url;

use harness_api::{
    config::TestConfig,
    error::{HarnessError, InternalError, InvalidInputError, ReportError},
};
use osutils::{
    connection::{CommandResult, Connection},
    dpkg::Dpkg,
};
use sysdefs::distro::TargetPlatform;

use crate::{
    assertions::{self, INSTALL_PROGRESS},
    packages::{self, BuiltPackage},
    provision::EnvironmentKind,
};

mod addons;
mod app_update_module;
mod client;
mod client_dev;
mod client_legacy;
mod companions;
mod gateway;
mod install_script;
mod install_script_legacy;
mod orchestrator;
mod tools;
mod update_modules;
mod upgrade_v4;
pub mod versions;

/// Everything a scenario gets to work with.
pub struct ScenarioContext<'a> {
    pub conn: Option<&'a dyn Connection>,
    pub config: &'a TestConfig,

    /// Platform of the packages installed in the environment.
    pub platform: &'a TargetPlatform,

    /// Installer script URL, when the script server runs.
    pub script_url: Option<&'a Url>,

    /// Parameter of a parametrized scenario.
    pub param: Option<&'a str>,
}

impl<'a> ScenarioContext<'a> {
    /// Shell of the environment.
    pub fn conn(&self) -> Result<&'a dyn Connection, HarnessError> {
        self.conn
            .structured(InternalError::Internal("Scenario needs an environment"))
    }

    pub fn script_url(&self) -> Result<&'a Url, HarnessError> {
        self.script_url
            .structured(InternalError::Internal("Scenario needs the script server"))
    }

    /// Parameter of the scenario, empty for plain scenarios.
    pub fn param(&self) -> &'a str {
        self.param.unwrap_or_default()
    }

    /// Debian version configured for package `name`.
    pub fn package_version(&self, name: &str) -> Result<&'a str, HarnessError> {
        self.config
            .package_version(crate::catalog::lookup(name)?.version_key)
    }
}

pub type ScenarioFn = fn(&ScenarioContext) -> Result<(), HarnessError>;

pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,

    /// Values the scenario runs once for. Empty for plain scenarios.
    pub params: &'static [&'static str],

    /// Reason to skip the scenario, if it is skipped.
    pub skip: Option<&'static str>,
}

impl Scenario {
    pub const fn new(name: &'static str, run: ScenarioFn) -> Self {
        Self {
            name,
            run,
            params: &[],
            skip: None,
        }
    }

    pub const fn with_params(mut self, params: &'static [&'static str]) -> Self {
        self.params = params;
        self
    }

    pub const fn skipped(mut self, reason: &'static str) -> Self {
        self.skip = Some(reason);
        self
    }
}

/// Lifetime of the environment of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// A fresh environment for every scenario.
    PerScenario,

    /// One environment for the whole suite. Scenarios build on each other.
    PerSuite,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Marker {
    /// Needs commercial packages.
    Commercial,

    /// Tests the C++ client.
    Cppclient,
}

pub struct Suite {
    pub name: &'static str,
    pub description: &'static str,
    pub environment: EnvironmentKind,
    pub scope: Scope,
    pub markers: &'static [Marker],

    /// Suites run by increasing order, then by name.
    pub order: i32,

    pub needs_script_server: bool,
    pub scenarios: &'static [Scenario],
}

inventory::collect!(Suite);

impl Suite {
    pub fn has_marker(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    /// Scenarios of the suite with their parameters expanded, in order.
    pub fn instances(&'static self) -> Vec<ScenarioInstance> {
        self.scenarios
            .iter()
            .flat_map(|scenario| {
                let params: Vec<Option<&'static str>> = if scenario.params.is_empty() {
                    vec![None]
                } else {
                    scenario.params.iter().copied().map(Some).collect()
                };
                params.into_iter().map(move |param| ScenarioInstance {
                    suite: self,
                    scenario,
                    param,
                })
            })
            .collect()
    }
}

/// A scenario for one of its parameters.
#[derive(Clone, Copy)]
pub struct ScenarioInstance {
    pub suite: &'static Suite,
    pub scenario: &'static Scenario,
    pub param: Option<&'static str>,
}

impl ScenarioInstance {
    /// Name of the scenario with its parameter, e.g. `default[stable]`.
    pub fn name(&self) -> String {
        match self.param {
            Some(param) => format!("{}[{param}]", self.scenario.name),
            None => self.scenario.name.to_string(),
        }
    }
}

impl Display for ScenarioInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.suite.name, self.name())
    }
}

/// Every registered suite, in run order.
pub fn all_suites() -> Vec<&'static Suite> {
    let mut suites: Vec<_> = inventory::iter::<Suite>().collect();
    suites.sort_by_key(|suite| (suite.order, suite.name));
    suites
}

pub fn find_suite(name: &str) -> Result<&'static Suite, HarnessError> {
    inventory::iter::<Suite>()
        .find(|suite| suite.name == name)
        .structured(InvalidInputError::UnknownSuite { name: name.into() })
}

/// Copy built package `name` into the environment.
fn upload(ctx: &ScenarioContext, name: &str) -> Result<BuiltPackage, HarnessError> {
    packages::upload_deb_package(ctx.conn()?, ctx.config, ctx.platform, name)
}

/// Install uploaded packages with `dpkg` and check that each was unpacked and
/// set up.
fn dpkg_install(
    ctx: &ScenarioContext,
    packages: &[&BuiltPackage],
    ignore_depends: Option<&str>,
) -> Result<CommandResult, HarnessError> {
    let mut dpkg = Dpkg::install(packages.iter().map(|p| p.filename.as_str())).noninteractive();
    if let Some(dependency) = ignore_depends {
        dpkg = dpkg.ignore_depends(dependency);
    }

    let result = ctx.conn()?.sudo(&dpkg.to_string())?;
    for package in packages {
        assertions::assert_dpkg_progress(&result, INSTALL_PROGRESS, package.name(), &package.version)?;
    }
    Ok(result)
}
