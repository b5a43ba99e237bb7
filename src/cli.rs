use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::{scenarios::Marker, DIST_TESTER_VERSION};

#[derive(Parser, Debug)]
#[clap(version = DIST_TESTER_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Also write every log record, as JSON lines, to this file. Overrides
    /// `run-log` of the configuration
    #[arg(global = true, long)]
    pub log_file: Option<PathBuf>,

    /// Write one JSON line per scenario result to this file. Overrides
    /// `result-trace` of the configuration
    #[arg(global = true, long)]
    pub trace_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Where the test configuration comes from, and what overrides it.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Configuration file, defaults to $DIST_TESTER_CONFIG when set
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Upstream version of the client the packages were built from
    #[clap(long)]
    pub mender_client_version: Option<String>,

    /// Debian version of the built client package
    #[clap(long)]
    pub mender_client_deb_version: Option<String>,

    /// Upstream version of mender-connect
    #[clap(long)]
    pub mender_connect_version: Option<String>,

    /// Upstream version of mender-configure
    #[clap(long)]
    pub mender_configure_version: Option<String>,

    /// Debian version of a built package, as NAME=VERSION. May be repeated
    #[clap(long = "package-version", value_name = "NAME=VERSION")]
    pub package_versions: Vec<String>,

    /// Run the suites that need commercial packages
    #[clap(long)]
    pub commercial_tests: bool,

    /// Directory holding the built packages
    #[clap(long)]
    pub packages_dir: Option<PathBuf>,

    /// Directory holding the installer scripts to serve
    #[clap(long)]
    pub script_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the test suites against the built packages
    Run {
        #[clap(flatten)]
        config: ConfigArgs,

        /// Run only this suite. May be repeated
        #[clap(short, long = "suite")]
        suites: Vec<String>,

        /// Run only the scenarios whose `suite::scenario[param]` name contains
        /// this string
        #[clap(short = 'k', long)]
        filter: Option<String>,

        /// Run only the suites carrying one of these markers
        #[clap(short, long = "marker", value_parser = parse_marker)]
        markers: Vec<Marker>,

        /// Path to save the report to, as JSON for a .json extension and as
        /// YAML otherwise
        #[clap(short, long)]
        report: Option<PathBuf>,

        /// Print the selected scenarios instead of running them
        #[clap(long)]
        list: bool,
    },

    /// List the suites and their scenarios
    List,

    /// Serve the installer scripts and built packages until interrupted
    Serve {
        #[clap(flatten)]
        config: ConfigArgs,
    },

    /// Check the package versions against the upstream versions, without
    /// provisioning anything
    #[clap(name = "check-versions")]
    CheckVersions {
        #[clap(flatten)]
        config: ConfigArgs,
    },
}

fn parse_marker(value: &str) -> Result<Marker, String> {
    value
        .parse()
        .map_err(|_| format!("unknown marker '{value}', expected 'commercial' or 'cppclient'"))
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::List => "list",
            Commands::Serve { .. } => "serve",
            Commands::CheckVersions { .. } => "check-versions",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}
