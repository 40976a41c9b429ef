//! CLI argument parsing for miniprof

use crate::time::TimeUnit;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "miniprof")]
#[command(version)]
#[command(
    about = "Inspect function-call traces captured by the miniprof recorder",
    long_about = None
)]
pub struct Cli {
    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Per-function timing table (total, children, self, min, max, calls)
    Report(ReportArgs),
    /// Every retained event with its delta from the previous one
    Dump(DumpArgs),
    /// Distinct function addresses in the trace and their names
    Symbols(SymbolArgs),
}

/// Where the trace comes from and how to name its addresses
#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    /// Trace file written by `Recorder::save`
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Instrumented binary whose debug info names the addresses
    #[arg(short, long, value_name = "ELF")]
    pub binary: Option<PathBuf>,

    /// Runtime load address minus link address (hex with 0x, or decimal)
    #[arg(
        long = "load-bias",
        value_name = "OFFSET",
        value_parser = parse_address,
        default_value = "0"
    )]
    pub load_bias: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Unit for every duration column
    #[arg(short, long, value_enum, default_value = "us")]
    pub unit: TimeUnit,

    /// Only show functions whose name (or hex address) matches this regex
    #[arg(long, value_name = "REGEX")]
    pub filter: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    #[command(flatten)]
    pub trace: TraceArgs,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Unit for the delta column
    #[arg(short, long, value_enum, default_value = "us")]
    pub unit: TimeUnit,
}

#[derive(Args, Debug, Clone)]
pub struct SymbolArgs {
    #[command(flatten)]
    pub trace: TraceArgs,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}
