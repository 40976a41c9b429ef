//! miniprof - low-overhead function-call tracing and profiling
//!
//! Captures entry/exit events for every instrumented function into a
//! fixed-size ring buffer, then rebuilds the call tree offline to report
//! per-function call counts with total, children and self time.
//!
//! Capture lives in [`recorder`] (and [`global`] for compiler hooks); analysis
//! runs on a snapshot through [`replay`] and [`stats`]; traces move between
//! processes via [`persistence`].

pub mod cli;
pub mod csv_output;
pub mod dwarf;
pub mod error;
pub mod event;
pub mod global;
pub mod json_output;
pub mod persistence;
pub mod recorder;
pub mod replay;
pub mod report;
pub mod ring_buffer;
pub mod stats;
pub mod symbols;
pub mod time;

pub use error::{ProfError, Result};
pub use event::{CallSite, Event, EventKind, FunctionAddr};
pub use recorder::{Recorder, RecorderConfig};
