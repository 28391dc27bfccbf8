//! CLI argument definitions for `sofa-gold`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "sofa-gold",
    version,
    about = "Gold-layer SOFA scoring over ICU measurements",
    long_about = "Score Sequential Organ Failure Assessment (SOFA) per ICU stay and \
                  time window.\n\n\
                  Reads standardized measurements, ICU stays and optional diagnoses \
                  from CSV and writes one keyed score row per window."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Score every eligible ICU stay and write the Gold score table.
    Run(RunArgs),

    /// List the SOFA parameters and the concepts they are read from.
    Parameters,

    /// Print the scoring configuration as TOML (defaults unless --config).
    Config(ConfigArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Standardized measurements CSV.
    #[arg(long = "measurements", value_name = "CSV")]
    pub measurements: PathBuf,

    /// ICU stays CSV with admission and discharge times.
    #[arg(long = "stays", value_name = "CSV")]
    pub stays: PathBuf,

    /// Diagnoses CSV used to label the ARI cohort. Without it every patient
    /// is OTHER.
    #[arg(long = "diagnoses", value_name = "CSV")]
    pub diagnoses: Option<PathBuf>,

    /// Scoring configuration (TOML).
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Gold score table. Existing rows with the same key are replaced.
    #[arg(long = "output", value_name = "CSV", default_value = "sofa_scores.csv")]
    pub output: PathBuf,

    /// Also write the run summary as JSON.
    #[arg(long = "summary-json", value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Also write the validation report as JSON.
    #[arg(long = "validation-json", value_name = "PATH")]
    pub validation_json: Option<PathBuf>,

    /// Include clinical values in trace logs.
    #[arg(long = "log-data")]
    pub log_data: bool,
}

#[derive(Parser)]
pub struct ConfigArgs {
    /// Configuration to load, validate and print.
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
