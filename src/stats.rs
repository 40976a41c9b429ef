//! Per-function timing statistics
//!
//! Built fresh from each replay so a report only ever reflects the events the
//! ring currently retains. Self time is derived at render time as
//! `total - children`.

use crate::event::{Event, FunctionAddr};
use crate::replay::{replay, CallSink, CompletedCall, ReplayAborted};
use crate::symbols::NameResolver;
use fnv::FnvHashMap;
use regex::Regex;
use std::time::Duration;

/// Statistics for a single function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionStat {
    /// Entries replayed, including calls still open at the end of the window
    pub count: u64,
    /// Calls that both entered and exited inside the window
    pub completed: u64,
    /// Cumulative elapsed time across completed calls
    pub total: Duration,
    /// Cumulative time spent in callees across completed calls
    pub children: Duration,
    /// Shortest completed call (unset until one completes)
    pub min: Option<Duration>,
    /// Longest completed call (unset until one completes)
    pub max: Option<Duration>,
    /// Resolved symbol name, filled lazily before rendering
    pub name: Option<String>,
}

impl FunctionStat {
    fn record_call(&mut self, duration: Duration, children: Duration) {
        self.completed += 1;
        self.total = self.total.saturating_add(duration);
        self.children = self.children.saturating_add(children);
        self.min = Some(self.min.map_or(duration, |m| m.min(duration)));
        self.max = Some(self.max.map_or(duration, |m| m.max(duration)));
    }

    /// Time spent in the function's own body
    pub fn self_time(&self) -> Duration {
        self.total.saturating_sub(self.children)
    }

    /// Mean elapsed time of a completed call
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.completed).ok().filter(|&n| n > 0)?;
        Some(self.total / n)
    }
}

/// Summary totals across all functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatTotals {
    pub functions: usize,
    pub calls: u64,
    pub self_time: Duration,
}

/// Tracks statistics for every function seen in a window
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    /// Map from function address to statistics
    stats: FnvHashMap<FunctionAddr, FunctionStat>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, function: FunctionAddr) -> Option<&FunctionStat> {
        self.stats.get(&function)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionAddr, &FunctionStat)> {
        self.stats.iter().map(|(addr, stat)| (*addr, stat))
    }

    /// Rows ordered by self time (descending), ties by address
    pub fn sorted(&self) -> Vec<(FunctionAddr, &FunctionStat)> {
        let mut rows: Vec<_> = self.iter().collect();
        rows.sort_by(|a, b| {
            b.1.self_time()
                .cmp(&a.1.self_time())
                .then_with(|| a.0.cmp(&b.0))
        });
        rows
    }

    /// Function count, completed calls and summed self time
    pub fn totals(&self) -> StatTotals {
        StatTotals {
            functions: self.stats.len(),
            calls: self.stats.values().map(|s| s.completed).sum(),
            self_time: self
                .stats
                .values()
                .map(FunctionStat::self_time)
                .fold(Duration::ZERO, Duration::saturating_add),
        }
    }

    /// Fill in names for every function that does not have one yet
    pub fn resolve_names(&mut self, resolver: &dyn NameResolver) {
        for (addr, stat) in self.stats.iter_mut() {
            if stat.name.is_none() {
                stat.name = resolver.resolve(*addr);
            }
        }
    }

    /// Keep only functions whose name (or hex address, when unnamed) matches
    pub fn retain_matching(&mut self, pattern: &Regex) {
        self.stats.retain(|addr, stat| match &stat.name {
            Some(name) => pattern.is_match(name),
            None => pattern.is_match(&addr.to_string()),
        });
    }
}

impl CallSink for StatsTable {
    fn on_entry(&mut self, function: FunctionAddr) {
        self.stats.entry(function).or_default().count += 1;
    }

    fn on_call(&mut self, call: &CompletedCall) {
        self.stats
            .entry(call.function)
            .or_default()
            .record_call(call.duration, call.children);
    }
}

/// One-shot aggregation of a chronological window
///
/// Use [`replay`] directly when the replay counters are needed too.
pub fn aggregate<'a, I>(events: I) -> Result<StatsTable, Box<ReplayAborted>>
where
    I: IntoIterator<Item = &'a Event>,
{
    replay(events).map(|r| r.stats)
}
