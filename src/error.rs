//! Error types for capture, persistence and replay

use crate::event::FunctionAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the profiler's cold paths
///
/// Capture itself (`record_event`, `enable`, `disable`) never fails; everything
/// here comes from initialization, the trace file codec, or replay.
#[derive(Error, Debug)]
pub enum ProfError {
    #[error("Invalid ring buffer capacity {0}: must be a positive integer")]
    InvalidCapacity(i64),

    #[error("Failed to allocate ring buffer for {capacity} events")]
    AllocationFailure { capacity: usize },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Trace save aborted after {written} of {expected} events: {source}")]
    PartialWrite {
        written: usize,
        expected: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt trace file: {0}")]
    CorruptFile(String),

    #[error("Truncated trace file: expected {expected} events, read {read}")]
    TruncatedFile { expected: usize, read: usize },

    #[error("Trace corruption at event {position}: {kind}")]
    TraceCorruption { position: usize, kind: CorruptionKind },
}

/// What made a replay window inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    #[error("exit from {function} with no open call")]
    UnmatchedExit { function: FunctionAddr },

    #[error("exit from {function} precedes its entry by {nanos}ns")]
    NegativeDuration { function: FunctionAddr, nanos: i128 },
}

/// Result type for profiler operations
pub type Result<T> = std::result::Result<T, ProfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capacity_display() {
        let err = ProfError::InvalidCapacity(-5);
        assert_eq!(
            err.to_string(),
            "Invalid ring buffer capacity -5: must be a positive integer"
        );
    }

    #[test]
    fn test_trace_corruption_display() {
        let err = ProfError::TraceCorruption {
            position: 7,
            kind: CorruptionKind::UnmatchedExit {
                function: FunctionAddr(0x1000),
            },
        };
        assert_eq!(
            err.to_string(),
            "Trace corruption at event 7: exit from 0x1000 with no open call"
        );
    }

    #[test]
    fn test_partial_write_keeps_source() {
        use std::error::Error as _;

        let err = ProfError::PartialWrite {
            written: 3,
            expected: 10,
            source: std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full"),
        };
        assert!(err.to_string().contains("3 of 10"));
        assert!(err.source().is_some());
    }
}
