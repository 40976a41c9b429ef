//! Human-readable reports: raw event dump, function table, symbol list

use crate::event::{Event, FunctionAddr};
use crate::replay::{annotate, ReplaySummary};
use crate::stats::StatsTable;
use crate::symbols::NameResolver;
use crate::time::TimeUnit;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::time::Duration;

const RULE_WIDTH: usize = 120;

fn fmt_duration(d: Duration, unit: TimeUnit) -> String {
    format!("{:.*}", unit.precision(), unit.convert(d))
}

fn fmt_optional(d: Option<Duration>, unit: TimeUnit) -> String {
    d.map_or_else(|| "-".to_string(), |d| fmt_duration(d, unit))
}

/// Print every retained event, oldest first, with the gap since the previous one
pub fn render_events<W: Write + ?Sized>(
    out: &mut W,
    events: &[Event],
    resolver: &dyn NameResolver,
    unit: TimeUnit,
) -> io::Result<()> {
    if events.is_empty() {
        return writeln!(out, "No events recorded.");
    }

    let delta_header = format!("delta({})", unit.suffix());
    writeln!(
        out,
        "  {:<5} {:>5} {:<18} {:<18} {:>21} {:>14} symbol",
        "kind", "depth", "function", "call_site", "timestamp", delta_header
    )?;
    writeln!(out, "{}", "─".repeat(RULE_WIDTH))?;

    let mut max_depth = 0;
    for row in annotate(events) {
        let event = row.event;
        max_depth = max_depth.max(event.depth);
        let name = resolver.resolve(event.function).unwrap_or_default();
        writeln!(
            out,
            "{} {:<5} {:>5} {:<18} {:<18} {:>21} {:>14.*} {}",
            event.kind.marker(),
            event.kind.as_str(),
            event.depth,
            event.function.to_string(),
            event.call_site.to_string(),
            event.timestamp.to_string(),
            unit.precision(),
            row.delta.as_unit(unit),
            name
        )?;
    }

    writeln!(out, "{}", "─".repeat(RULE_WIDTH))?;
    writeln!(out, "{} events, max depth {}", events.len(), max_depth)
}

/// Print the per-function table, sorted by self time
///
/// Names come from the table itself; call [`StatsTable::resolve_names`]
/// first to fill them in.
pub fn render_stats<W: Write + ?Sized>(
    out: &mut W,
    table: &StatsTable,
    summary: Option<&ReplaySummary>,
    unit: TimeUnit,
) -> io::Result<()> {
    if table.is_empty() {
        return writeln!(out, "No function profiling data collected.");
    }

    let suffix = unit.suffix();
    writeln!(
        out,
        "{:<18} {:>14} {:>14} {:>14} {:>12} {:>12} {:>8} function",
        "address",
        format!("total({suffix})"),
        format!("children({suffix})"),
        format!("self({suffix})"),
        format!("min({suffix})"),
        format!("max({suffix})"),
        "calls",
    )?;
    writeln!(out, "{}", "─".repeat(RULE_WIDTH))?;

    for (addr, stat) in table.sorted() {
        writeln!(
            out,
            "{:<18} {:>14} {:>14} {:>14} {:>12} {:>12} {:>8} {}",
            addr.to_string(),
            fmt_duration(stat.total, unit),
            fmt_duration(stat.children, unit),
            fmt_duration(stat.self_time(), unit),
            fmt_optional(stat.min, unit),
            fmt_optional(stat.max, unit),
            stat.count,
            stat.name.as_deref().unwrap_or("?")
        )?;
    }

    writeln!(out, "{}", "─".repeat(RULE_WIDTH))?;
    let totals = table.totals();
    writeln!(
        out,
        "{:<18} {:>14} {:>14} {:>14} {:>12} {:>12} {:>8} total ({} functions)",
        "",
        "",
        "",
        fmt_duration(totals.self_time, unit),
        "",
        "",
        totals.calls,
        totals.functions
    )?;

    if let Some(summary) = summary {
        writeln!(
            out,
            "max depth {}, {} completed calls, {} still open, {} synthetic frames",
            summary.max_depth, summary.completed_calls, summary.orphans, summary.synthetic_frames
        )?;
    }
    Ok(())
}

/// List every distinct function in the window with its resolved name
pub fn render_symbols<W: Write + ?Sized>(
    out: &mut W,
    events: &[Event],
    resolver: &dyn NameResolver,
) -> io::Result<()> {
    let functions: BTreeSet<FunctionAddr> = events.iter().map(|e| e.function).collect();
    if functions.is_empty() {
        return writeln!(out, "No symbols.");
    }

    writeln!(out, "{:<18} {:<40} location", "address", "symbol")?;
    for addr in functions {
        let name = resolver.resolve(addr);
        let name = name.as_deref().unwrap_or("?");
        match resolver.source_location(addr) {
            Some(location) => {
                writeln!(out, "{:<18} {:<40} {}", addr.to_string(), name, location)?
            }
            None => writeln!(out, "{:<18} {}", addr.to_string(), name)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::replay;
    use crate::symbols::{NoSymbols, SymbolTable};
    use crate::time::Timestamp;

    fn events() -> Vec<Event> {
        let us = |n| Timestamp::from_duration(Duration::from_micros(n));
        vec![
            Event::entry(0x10, 0, us(0)),
            Event::entry(0x20, 1, us(100)),
            Event::exit(0x20, 1, us(350)),
            Event::exit(0x10, 0, us(400)),
        ]
    }

    fn symbols() -> SymbolTable {
        [
            (FunctionAddr(0x10), "outer".to_string()),
            (FunctionAddr(0x20), "inner".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_event_dump_columns() {
        let text = render(|out| render_events(out, &events(), &symbols(), TimeUnit::Micros));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("delta(us)"));
        assert!(lines[2].starts_with("> entry"));
        assert!(lines[2].contains("0x10"));
        assert!(lines[2].ends_with("outer"));
        assert!(lines[4].contains("250.000"));
        assert!(text.contains("4 events, max depth 1"));
    }

    #[test]
    fn test_empty_dump() {
        let text = render(|out| render_events(out, &[], &NoSymbols, TimeUnit::Micros));
        assert_eq!(text, "No events recorded.\n");
    }

    #[test]
    fn test_stats_table_rows() {
        let mut replay = replay(&events()).unwrap();
        replay.stats.resolve_names(&symbols());
        let text = render(|out| {
            render_stats(out, &replay.stats, Some(&replay.summary), TimeUnit::Micros)
        });

        let inner = text.lines().find(|l| l.ends_with("inner")).unwrap();
        let cols: Vec<&str> = inner.split_whitespace().collect();
        assert_eq!(
            cols,
            vec!["0x20", "250.000", "0.000", "250.000", "250.000", "250.000", "1", "inner"]
        );

        let outer = text.lines().find(|l| l.ends_with("outer")).unwrap();
        let cols: Vec<&str> = outer.split_whitespace().collect();
        assert_eq!(cols[1..4], ["400.000", "250.000", "150.000"]);
        assert!(text.contains("max depth 2"));
    }

    #[test]
    fn test_stats_unresolved_name_placeholder() {
        let replay = replay(&events()).unwrap();
        let text = render(|out| render_stats(out, &replay.stats, None, TimeUnit::Millis));
        assert!(text.contains("total(ms)"));
        assert!(text.lines().any(|l| l.ends_with(" ?")));
    }

    #[test]
    fn test_symbol_listing_is_sorted_and_distinct() {
        let text = render(|out| render_symbols(out, &events(), &symbols()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0x10"));
        assert!(lines[2].ends_with("inner"));
    }

    struct LineInfo;

    impl NameResolver for LineInfo {
        fn resolve(&self, addr: FunctionAddr) -> Option<String> {
            (addr == FunctionAddr(0x20)).then(|| "inner".to_string())
        }

        fn source_location(&self, addr: FunctionAddr) -> Option<String> {
            (addr == FunctionAddr(0x20)).then(|| "src/lib.rs:42".to_string())
        }
    }

    #[test]
    fn test_symbol_listing_shows_source_location() {
        let text = render(|out| render_symbols(out, &events(), &LineInfo));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("location"));
        assert_eq!(lines[1].split_whitespace().collect::<Vec<_>>(), vec!["0x10", "?"]);
        let cols: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(cols, vec!["0x20", "inner", "src/lib.rs:42"]);
    }
}
