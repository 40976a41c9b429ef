//! Captured call events
//!
//! Function and call-site identities arrive from the instrumentation hook as raw
//! code addresses. They are kept as opaque integers: compared and hashed by
//! value, printed as hex, never dereferenced.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an instrumented function (its entry address)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FunctionAddr(pub u64);

/// Identity of the call instruction that invoked a function
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CallSite(pub u64);

impl fmt::Display for FunctionAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for FunctionAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Whether an event marks a call boundary going in or coming out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Entry,
    Exit,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Entry => "entry",
            EventKind::Exit => "exit",
        }
    }

    /// Single-character marker used by the text dump
    pub fn marker(self) -> char {
        match self {
            EventKind::Entry => '>',
            EventKind::Exit => '<',
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry or exit observation
///
/// The entry and exit of a single call carry the same `depth`: the nesting
/// level the call itself occupies, 0 for the outermost call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub function: FunctionAddr,
    pub call_site: CallSite,
    pub kind: EventKind,
    pub depth: u32,
}

impl Event {
    pub fn new(
        kind: EventKind,
        function: FunctionAddr,
        call_site: CallSite,
        depth: u32,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            function,
            call_site,
            kind,
            depth,
        }
    }

    pub fn entry(function: u64, depth: u32, timestamp: Timestamp) -> Self {
        Self::new(
            EventKind::Entry,
            FunctionAddr(function),
            CallSite(0),
            depth,
            timestamp,
        )
    }

    pub fn exit(function: u64, depth: u32, timestamp: Timestamp) -> Self {
        Self::new(
            EventKind::Exit,
            FunctionAddr(function),
            CallSite(0),
            depth,
            timestamp,
        )
    }

    pub fn is_entry(&self) -> bool {
        self.kind == EventKind::Entry
    }

    /// Number of calls open immediately before this event was recorded
    ///
    /// An entry at depth `d` has `d` enclosing calls open; an exit at depth `d`
    /// still has its own call open as well.
    pub fn open_calls_before(&self) -> usize {
        match self.kind {
            EventKind::Entry => self.depth as usize,
            EventKind::Exit => (self.depth as usize).saturating_add(1),
        }
    }

    /// Nesting level immediately after this event was recorded
    pub fn level_after(&self) -> u32 {
        match self.kind {
            EventKind::Entry => self.depth.saturating_add(1),
            EventKind::Exit => self.depth,
        }
    }
}
