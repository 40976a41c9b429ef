//! JSON output format for profiles and event dumps

use crate::event::Event;
use crate::replay::{annotate, ReplaySummary};
use crate::stats::StatsTable;
use crate::symbols::NameResolver;
use crate::time::TimeUnit;
use serde::{Deserialize, Serialize};

const FORMAT_NAME: &str = "miniprof-json-v1";

/// One function row of the profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFunction {
    /// Function address as hex (e.g. "0x401136")
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Entries seen, open calls included
    pub count: u64,
    /// Calls that completed inside the window
    pub completed: u64,
    pub total: f64,
    pub children: f64,
    #[serde(rename = "self")]
    pub self_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Replay counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub events: usize,
    pub max_depth: usize,
    pub completed_calls: u64,
    pub orphans: usize,
    pub synthetic_frames: usize,
    pub mismatched_exits: u64,
    /// Set when the replay stopped early on corrupt data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl From<&ReplaySummary> for JsonSummary {
    fn from(summary: &ReplaySummary) -> Self {
        Self {
            events: summary.events,
            max_depth: summary.max_depth,
            completed_calls: summary.completed_calls,
            orphans: summary.orphans,
            synthetic_frames: summary.synthetic_frames,
            mismatched_exits: summary.mismatched_exits,
            aborted: None,
        }
    }
}

/// Root structure of `report --format json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonProfile {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    /// Unit every duration field is expressed in
    pub unit: String,
    pub functions: Vec<JsonFunction>,
    pub summary: JsonSummary,
}

impl JsonProfile {
    /// Build from a (possibly filtered) table, rows sorted by self time
    pub fn from_table(table: &StatsTable, summary: &ReplaySummary, unit: TimeUnit) -> Self {
        let functions = table
            .sorted()
            .into_iter()
            .map(|(addr, stat)| JsonFunction {
                address: addr.to_string(),
                name: stat.name.clone(),
                count: stat.count,
                completed: stat.completed,
                total: unit.convert(stat.total),
                children: unit.convert(stat.children),
                self_time: unit.convert(stat.self_time()),
                min: stat.min.map(|d| unit.convert(d)),
                max: stat.max.map(|d| unit.convert(d)),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT_NAME.to_string(),
            unit: unit.suffix().to_string(),
            functions,
            summary: summary.into(),
        }
    }

    /// Record that the profile only covers events up to a corruption point
    pub fn mark_aborted(&mut self, reason: impl Into<String>) {
        self.summary.aborted = Some(reason.into());
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A single event of `dump --format json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEvent {
    pub kind: String,
    pub depth: u32,
    pub function: String,
    pub call_site: String,
    /// Seconds on the monotonic clock, e.g. "12.000004200"
    pub timestamp: String,
    /// Gap since the previous event, in the dump's unit
    pub delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Root structure of `dump --format json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDump {
    pub version: String,
    pub format: String,
    pub unit: String,
    pub max_depth: u32,
    pub events: Vec<JsonEvent>,
}

impl JsonDump {
    pub fn from_events(events: &[Event], resolver: &dyn NameResolver, unit: TimeUnit) -> Self {
        let events: Vec<JsonEvent> = annotate(events)
            .into_iter()
            .map(|row| JsonEvent {
                kind: row.event.kind.as_str().to_string(),
                depth: row.event.depth,
                function: row.event.function.to_string(),
                call_site: row.event.call_site.to_string(),
                timestamp: row.event.timestamp.to_string(),
                delta: row.delta.as_unit(unit),
                name: resolver.resolve(row.event.function),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT_NAME.to_string(),
            unit: unit.suffix().to_string(),
            max_depth: events.iter().map(|e| e.depth).max().unwrap_or(0),
            events,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
