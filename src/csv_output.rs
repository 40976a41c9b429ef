//! CSV output format for profiles and event dumps
//!
//! For spreadsheet analysis and machine parsing. Durations are plain numbers
//! in the chosen unit; the unit is part of the column name.

use crate::event::Event;
use crate::replay::annotate;
use crate::stats::StatsTable;
use crate::symbols::NameResolver;
use crate::time::TimeUnit;
use std::time::Duration;

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn number(d: Duration, unit: TimeUnit) -> String {
    format!("{:.*}", unit.precision(), unit.convert(d))
}

/// CSV statistics output formatter (for `report`)
#[derive(Debug)]
pub struct CsvStatsOutput {
    unit: TimeUnit,
}

impl CsvStatsOutput {
    pub fn new(unit: TimeUnit) -> Self {
        Self { unit }
    }

    fn header(&self) -> String {
        let u = self.unit.suffix();
        format!(
            "address,name,count,completed,total_{u},children_{u},self_{u},min_{u},max_{u}"
        )
    }

    /// Generate CSV output for a table, rows sorted by self time
    pub fn to_csv(&self, table: &StatsTable) -> String {
        let mut output = self.header();
        output.push('\n');

        for (addr, stat) in table.sorted() {
            let fields = [
                addr.to_string(),
                escape_field(stat.name.as_deref().unwrap_or("")),
                stat.count.to_string(),
                stat.completed.to_string(),
                number(stat.total, self.unit),
                number(stat.children, self.unit),
                number(stat.self_time(), self.unit),
                stat.min.map(|d| number(d, self.unit)).unwrap_or_default(),
                stat.max.map(|d| number(d, self.unit)).unwrap_or_default(),
            ];
            output.push_str(&fields.join(","));
            output.push('\n');
        }

        output
    }
}

/// CSV event formatter (for `dump`)
#[derive(Debug)]
pub struct CsvEventOutput {
    unit: TimeUnit,
}

impl CsvEventOutput {
    pub fn new(unit: TimeUnit) -> Self {
        Self { unit }
    }

    fn header(&self) -> String {
        format!(
            "kind,depth,function,call_site,timestamp,delta_{},name",
            self.unit.suffix()
        )
    }

    pub fn to_csv(&self, events: &[Event], resolver: &dyn NameResolver) -> String {
        let mut output = self.header();
        output.push('\n');

        for row in annotate(events) {
            let event = row.event;
            let name = resolver.resolve(event.function).unwrap_or_default();
            output.push_str(&format!(
                "{},{},{},{},{},{:.*},{}\n",
                event.kind,
                event.depth,
                event.function,
                event.call_site,
                event.timestamp,
                self.unit.precision(),
                row.delta.as_unit(self.unit),
                escape_field(&name)
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FunctionAddr;
    use crate::replay::replay;
    use crate::symbols::{NoSymbols, SymbolTable};
    use crate::time::Timestamp;

    fn events() -> Vec<Event> {
        let ms = |n| Timestamp::from_duration(Duration::from_millis(n));
        vec![
            Event::entry(0x10, 0, ms(0)),
            Event::entry(0x20, 1, ms(2)),
            Event::exit(0x20, 1, ms(5)),
            Event::exit(0x10, 0, ms(6)),
        ]
    }

    #[test]
    fn test_csv_escape_field_simple() {
        assert_eq!(escape_field("hello"), "hello");
    }

    #[test]
    fn test_csv_escape_field_with_comma() {
        assert_eq!(escape_field("Vec<T, A>::push"), "\"Vec<T, A>::push\"");
    }

    #[test]
    fn test_csv_escape_field_with_quote() {
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_stats_header_carries_unit() {
        let csv = CsvStatsOutput::new(TimeUnit::Millis).to_csv(&StatsTable::new());
        assert_eq!(
            csv,
            "address,name,count,completed,total_ms,children_ms,self_ms,min_ms,max_ms\n"
        );
    }

    #[test]
    fn test_csv_stats_rows() {
        let mut replay = replay(&events()).unwrap();
        let symbols: SymbolTable = [(FunctionAddr(0x10), "outer".to_string())]
            .into_iter()
            .collect();
        replay.stats.resolve_names(&symbols);

        let csv = CsvStatsOutput::new(TimeUnit::Millis).to_csv(&replay.stats);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        // Equal self time, so address order decides
        assert_eq!(
            lines[1],
            "0x10,outer,1,1,6.000000,3.000000,3.000000,6.000000,6.000000"
        );
        assert_eq!(
            lines[2],
            "0x20,,1,1,3.000000,0.000000,3.000000,3.000000,3.000000"
        );
    }

    #[test]
    fn test_csv_events() {
        let csv = CsvEventOutput::new(TimeUnit::Micros).to_csv(&events(), &NoSymbols);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "kind,depth,function,call_site,timestamp,delta_us,name");
        assert_eq!(lines[1], "entry,0,0x10,0x0,0.000000000,0.000,");
        assert_eq!(lines[3], "exit,1,0x20,0x0,0.005000000,3000.000,");
    }
}
