//! Integration tests of the Debian packages of the Mender client and its
//! add-ons. Suites of scenarios run against freshly provisioned containers
//! and emulated devices, and the outcome of each scenario is reported.

pub mod apt_repo;
pub mod assertions;
pub mod catalog;
pub mod cli;
pub mod config;
mod logging;
pub mod packages;
pub mod polling;
pub mod provision;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod script_server;

pub use logging::{
    multilog::MultiLogger, result_trace::ResultTrace, run_log::RunLog, set_current_scenario,
};

/// Dist-tester version as provided by cargo.
pub const DIST_TESTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How a command ended, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Everything ran and passed.
    Done,

    /// Everything ran, but some scenarios failed.
    TestsFailed,
}
