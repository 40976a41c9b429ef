use anyhow::{Context, Result};
use clap::Parser;
use miniprof::cli::{Cli, Command, DumpArgs, OutputFormat, ReportArgs, SymbolArgs, TraceArgs};
use miniprof::csv_output::{CsvEventOutput, CsvStatsOutput};
use miniprof::dwarf::DwarfContext;
use miniprof::event::Event;
use miniprof::json_output::{JsonDump, JsonProfile};
use miniprof::replay::{replay, Replay};
use miniprof::symbols::{NameResolver, NoSymbols};
use miniprof::{persistence, report};
use regex::Regex;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_trace(args: &TraceArgs) -> Result<Vec<Event>> {
    persistence::load(&args.file)
        .with_context(|| format!("Failed to load trace file {}", args.file.display()))
}

fn build_resolver(args: &TraceArgs) -> Result<Box<dyn NameResolver>> {
    match &args.binary {
        Some(binary) => {
            let ctx = DwarfContext::load(binary)?.with_load_bias(args.load_bias);
            Ok(Box::new(ctx))
        }
        None => Ok(Box::new(NoSymbols)),
    }
}

fn write_stats(
    out: &mut dyn Write,
    replay: &Replay,
    args: &ReportArgs,
    aborted: Option<&str>,
) -> Result<()> {
    match args.format {
        OutputFormat::Text => {
            report::render_stats(out, &replay.stats, Some(&replay.summary), args.unit)?;
        }
        OutputFormat::Json => {
            let mut profile = JsonProfile::from_table(&replay.stats, &replay.summary, args.unit);
            if let Some(reason) = aborted {
                profile.mark_aborted(reason);
            }
            writeln!(out, "{}", profile.to_json()?)?;
        }
        OutputFormat::Csv => {
            write!(out, "{}", CsvStatsOutput::new(args.unit).to_csv(&replay.stats))?;
        }
    }
    Ok(())
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let events = load_trace(&args.trace)?;
    let resolver = build_resolver(&args.trace)?;
    let filter = args
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter regex")?;

    let (mut result, failure) = match replay(&events) {
        Ok(replay) => (replay, None),
        Err(aborted) => {
            let aborted = *aborted;
            let reason = aborted.error.to_string();
            (aborted.partial, Some((reason, aborted.error)))
        }
    };

    result.stats.resolve_names(resolver.as_ref());
    if let Some(pattern) = &filter {
        result.stats.retain_matching(pattern);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let reason = failure.as_ref().map(|(reason, _)| reason.as_str());
    write_stats(&mut out, &result, args, reason)?;
    out.flush()?;

    // Partial table is already printed; still fail the command
    if let Some((_, error)) = failure {
        return Err(error).context("Trace is corrupt; statistics above are partial");
    }
    Ok(())
}

fn run_dump(args: &DumpArgs) -> Result<()> {
    let events = load_trace(&args.trace)?;
    let resolver = build_resolver(&args.trace)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Text => {
            report::render_events(&mut out, &events, resolver.as_ref(), args.unit)?;
        }
        OutputFormat::Json => {
            let dump = JsonDump::from_events(&events, resolver.as_ref(), args.unit);
            writeln!(out, "{}", dump.to_json()?)?;
        }
        OutputFormat::Csv => {
            let csv = CsvEventOutput::new(args.unit).to_csv(&events, resolver.as_ref());
            write!(out, "{csv}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_symbols(args: &SymbolArgs) -> Result<()> {
    let events = load_trace(&args.trace)?;
    let resolver = build_resolver(&args.trace)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::render_symbols(&mut out, &events, resolver.as_ref())?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(cli.debug);

    match &cli.command {
        Command::Report(args) => run_report(args),
        Command::Dump(args) => run_dump(args),
        Command::Symbols(args) => run_symbols(args),
    }
}
