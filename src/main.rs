use std::process::ExitCode;

use anyhow::{anyhow, Context, Error};
use clap::Parser;
use log::{debug, error, info, LevelFilter};

use dist_tester::{
    cli::{Cli, Commands, ConfigArgs},
    config,
    runner::{self, Selection},
    scenarios::{self, versions},
    script_server, ExitKind, MultiLogger, ResultTrace, RunLog, DIST_TESTER_VERSION,
};
use harness_api::{
    config::TestConfig,
    error::{HarnessError, HarnessResultExt},
};

/// Files the run is recorded in. Both are installed before the configuration
/// is loaded and opened once their paths are known.
struct RunFiles {
    run_log: RunLog,
    result_trace: ResultTrace,
}

impl RunFiles {
    /// Load the configuration, then open the files it names that the command
    /// line did not.
    fn load_config(&self, config_args: &ConfigArgs) -> Result<TestConfig, HarnessError> {
        let config = config::load(config_args, |name| std::env::var(name).ok())
            .message("Failed to load configuration")?;

        if let Some(ref path) = config.run_log {
            if !self.run_log.is_open() {
                self.run_log.open(path)?;
                debug!("Logging to '{}'", path.display());
            }
        }
        if let Some(ref path) = config.result_trace {
            if !self.result_trace.is_open() {
                self.result_trace.open(path)?;
            }
        }
        Ok(config)
    }
}

fn list(selection: &Selection) -> Result<ExitKind, HarnessError> {
    for planned in runner::plan(selection)? {
        let suite = planned.suite;
        let markers: Vec<&str> = suite.markers.iter().map(|m| <&str>::from(*m)).collect();
        println!(
            "{} ({}, {}{}{}): {}",
            suite.name,
            suite.environment,
            suite.scope,
            if markers.is_empty() { "" } else { ", " },
            markers.join(", "),
            suite.description
        );
        for instance in planned.instances {
            match instance.scenario.skip {
                Some(reason) => println!("    {instance} (skipped: {reason})"),
                None => println!("    {instance}"),
            }
        }
    }
    Ok(ExitKind::Done)
}

fn run_dist_tester(args: &Cli, files: &RunFiles) -> Result<ExitKind, HarnessError> {
    info!("Dist-tester version: {DIST_TESTER_VERSION}");

    match &args.command {
        Commands::List => list(&Selection::default()),

        Commands::Run {
            config: config_args,
            suites,
            filter,
            markers,
            report,
            list: list_only,
        } => {
            let selection = Selection {
                suites: suites.clone(),
                filter: filter.clone(),
                markers: markers.clone(),
            };
            if *list_only {
                return list(&selection);
            }

            let config = files.load_config(config_args)?;
            let run_report = runner::run(&config, &selection)
                .message(format!("Failed to execute '{}' command", args.command))?;

            if let Some(path) = report {
                run_report.write(path)?;
                info!("Report written to '{}'", path.display());
            }

            info!("{}", run_report.summary());
            Ok(if run_report.success() {
                ExitKind::Done
            } else {
                ExitKind::TestsFailed
            })
        }

        Commands::Serve {
            config: config_args,
        } => {
            let config = files.load_config(config_args)?;
            script_server::serve_until_interrupted(&config).map(|()| ExitKind::Done)
        }

        Commands::CheckVersions {
            config: config_args,
        } => {
            let config = files.load_config(config_args)?;
            versions::check_versions(&config)
                .map(|()| ExitKind::Done)
                .or_else(|e| {
                    if e.is_assertion() {
                        error!("{e:?}");
                        Ok(ExitKind::TestsFailed)
                    } else {
                        Err(e)
                    }
                })
        }
    }
}

fn setup_logging(args: &Cli, run_log: &RunLog) -> Result<(), Error> {
    let multilogger = MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ))
        .with_logger(run_log.make_logger())
        // The readiness check of the script server is chatty
        .with_global_filter("reqwest", LevelFilter::Info)
        .with_global_filter("hyper", LevelFilter::Off);

    if let Some(ref path) = args.log_file {
        run_log
            .open(path)
            .map_err(|e| anyhow!("Failed to open run log: {e:?}"))?;
    }

    multilogger.init().context("Logger already registered")?;
    Ok(())
}

fn setup_tracing(args: &Cli, result_trace: &ResultTrace) -> Result<(), Error> {
    use tracing_subscriber::{filter, layer::SubscriberExt, Layer};

    if let Some(ref path) = args.trace_file {
        result_trace
            .open(path)
            .map_err(|e| anyhow!("Failed to open result trace: {e:?}"))?;
    }

    tracing::subscriber::set_global_default(
        tracing_subscriber::Registry::default()
            .with(result_trace.clone().with_filter(filter::LevelFilter::INFO)),
    )
    .context("Failed to set global default subscriber")?;

    Ok(())
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    let files = RunFiles {
        run_log: RunLog::default(),
        result_trace: ResultTrace::default(),
    };

    // Initialize the loggers
    if let Err(e) = setup_logging(&args, &files.run_log) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = setup_tracing(&args, &files.result_trace) {
        error!("Failed to initialize tracing: {e:?}");
        return ExitCode::from(1);
    }

    debug!("{} suites registered", scenarios::all_suites().len());

    match run_dist_tester(&args, &files) {
        Ok(ExitKind::Done) => ExitCode::SUCCESS,
        Ok(ExitKind::TestsFailed) => ExitCode::from(3),
        Err(e) => {
            error!("Dist-tester failed: {e:?}");
            ExitCode::from(2)
        }
    }
}
