//! ec - experiment coordinator mission-loop simulator
//!
//! Registers the configured sample experiments, runs a simulated mission loop
//! and drives one experiment through the coordinator.

use std::fs;

use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::info;

use clap::Parser;
use expcoord::cli::{Cli, Command, OutputFormat, get_log_path};
use expcoord::config::Config;
use expcoord::coordinator::Coordinator;
use expcoord::experiment::{ExperimentCode, IterationResult, StartResult};
use expcoord::mission::{FollowOptions, MissionLoop, RunEnd, RunReport, follow_run};

fn setup_logging(verbose: bool, to_stderr: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        // Setup tracing subscriber - write to log file, not stdout/stderr
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_stderr).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!(
        "Loaded config: tick_ms={}, experiments={}",
        config.mission.tick_ms,
        config.experiments.len()
    );

    match cli.command {
        Some(Command::List { format }) => cmd_list(&config, format),
        Some(Command::Run {
            code,
            ticks,
            abort_after_ticks,
            format,
        }) => cmd_run(&config, code, ticks, abort_after_ticks, format).await,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// List the configured experiments
fn cmd_list(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config.experiments)?);
        }
        OutputFormat::Text => {
            if config.experiments.is_empty() {
                println!("No experiments configured");
                return Ok(());
            }
            println!("{}", "Registered experiments:".bold());
            for def in &config.experiments {
                let pacing = if def.wait_for_cycle { "per-tick" } else { "free-running" };
                println!(
                    "  {:>3}  {:<24} {:>4} iterations  {}",
                    def.code.to_string().cyan(),
                    def.name,
                    def.iterations,
                    pacing.dimmed()
                );
            }
        }
    }
    Ok(())
}

/// Request, start and follow a single experiment run
async fn cmd_run(
    config: &Config,
    code: ExperimentCode,
    ticks: u64,
    abort_after_ticks: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let registry = config.build_registry()?;
    let coordinator = Coordinator::spawn(registry, config.coordinator.clone());
    let handle = coordinator.handle();
    let mission = MissionLoop::new(config.mission.clone(), handle.clone()).spawn();

    if !handle.request_experiment(code).await? {
        return Err(eyre!("Experiment {} rejected: another run is in progress", code));
    }
    let baseline = handle.metrics();
    handle.start_experiment().await?;

    let options = FollowOptions::new(ticks, abort_after_ticks);
    let show_progress = matches!(format, OutputFormat::Text);
    let report = follow_run(&coordinator, &mission, &baseline, &options, |tick, state| {
        if show_progress {
            println!(
                "  tick {:>4}  iteration {:>4}  {}",
                tick,
                state.iteration_counter,
                describe_iteration(state.last_iteration_result)
            );
        }
    })
    .await
    .context("Failed to follow experiment run")?;

    let tick_count = mission.stop().await;
    coordinator.shutdown().await.context("Coordinator shutdown failed")?;
    info!(tick_count, end = ?report.end, "Simulation finished");

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "report": report,
                "ticks": tick_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => print_summary(code, &report, tick_count),
    }
    Ok(())
}

fn describe_iteration(result: Option<IterationResult>) -> String {
    match result {
        Some(IterationResult::Finished) => "finished".green().to_string(),
        Some(IterationResult::Failure) => "failure".red().to_string(),
        Some(IterationResult::WaitForNextCycle) => "waiting for next cycle".yellow().to_string(),
        Some(IterationResult::LoopImmediately) => "looping".to_string(),
        Some(IterationResult::None) => "none".to_string(),
        None => "-".dimmed().to_string(),
    }
}

fn print_summary(code: ExperimentCode, report: &RunReport, ticks: u64) {
    println!();
    let verdict = match report.end {
        RunEnd::Dropped => {
            println!("{} experiment {} is not registered", "Dropped:".red().bold(), code);
            return;
        }
        RunEnd::Finished => "finished".green(),
        RunEnd::Aborted => "aborted".yellow(),
        RunEnd::Failed if report.state.last_start_result == Some(StartResult::Failure) => "start failed".red(),
        RunEnd::Failed => "failed".red(),
    };
    println!("{} experiment {} {}", "Result:".bold(), code, verdict);
    println!("  iterations: {}", report.state.iteration_counter);
    println!("  mission ticks: {}", ticks);
}
