//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::experiment::ExperimentCode;

/// ec - experiment coordinator mission-loop simulator
#[derive(Parser)]
#[command(
    name = "ec",
    about = "Run onboard experiments one at a time against a simulated mission loop",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/expcoord/logs/expcoord.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// List registered experiments
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Request, start and follow one experiment run
    Run {
        /// Experiment code
        #[arg(value_name = "CODE")]
        code: ExperimentCode,

        /// Give up (and abort) after this many mission ticks
        #[arg(short, long, default_value = "100")]
        ticks: u64,

        /// Abort the run after this many mission ticks
        #[arg(long)]
        abort_after_ticks: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for list/run
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Path of the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("expcoord")
        .join("logs")
        .join("expcoord.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ec", "run", "5", "--ticks", "10", "--format", "json"]).unwrap();
        match cli.command {
            Some(Command::Run {
                code, ticks, format, ..
            }) => {
                assert_eq!(code, ExperimentCode(5));
                assert_eq!(ticks, 10);
                assert!(matches!(format, OutputFormat::Json));
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_code() {
        assert!(Cli::try_parse_from(["ec", "run", "999"]).is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
