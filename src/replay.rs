//! Call-tree reconstruction from a flat event window
//!
//! The replayer walks events oldest to newest with an explicit frame stack.
//! Every exit pops one frame and yields a [`CompletedCall`] carrying the
//! call's elapsed time and the time spent in the calls it made. Consumers
//! implement [`CallSink`]; the statistics table is one of them.
//!
//! # Windows that start mid-call
//!
//! Once the ring has wrapped, the oldest retained event may sit inside calls
//! whose entries were overwritten. The first event's depth says how many:
//! an entry at depth `d` has `d` open ancestors, an exit at depth `d` has its
//! own call open as well. That many synthetic frames sit under the stack
//! before the walk so the exits closing them balance it. Synthetic frames have
//! no function identity and never reach the sink. Time is never credited to
//! them.
//!
//! # Orphans
//!
//! Frames still open when the window ends are calls that have not returned
//! yet (typically the in-flight chain that triggered the report). They are
//! dropped without error and counted in the summary.

use crate::error::{CorruptionKind, ProfError, Result};
use crate::event::{Event, EventKind, FunctionAddr};
use crate::stats::StatsTable;
use crate::time::Timestamp;
use std::time::Duration;

/// One call that entered and exited inside the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCall {
    pub function: FunctionAddr,
    /// The caller, when it is a real (non-synthetic) frame
    pub parent: Option<FunctionAddr>,
    /// Nesting level of the call, counting synthetic ancestors
    pub depth: usize,
    pub entered: Timestamp,
    pub exited: Timestamp,
    /// Elapsed time from entry to exit
    pub duration: Duration,
    /// Time spent inside callees; never exceeds `duration`
    pub children: Duration,
}

impl CompletedCall {
    pub fn self_time(&self) -> Duration {
        self.duration.saturating_sub(self.children)
    }
}

/// Receives the replayer's output
pub trait CallSink {
    /// A real entry was replayed
    fn on_entry(&mut self, _function: FunctionAddr) {}

    /// A real call completed
    fn on_call(&mut self, call: &CompletedCall);
}

impl CallSink for Vec<CompletedCall> {
    fn on_call(&mut self, call: &CompletedCall) {
        self.push(call.clone());
    }
}

/// Open call on the replay stack
#[derive(Debug, Clone)]
struct Frame {
    function: FunctionAddr,
    entered: Timestamp,
    children: Duration,
}

/// Counters describing one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events consumed (including the one that aborted the walk, if any)
    pub events: usize,
    /// Deepest stack seen, synthetic frames included
    pub max_depth: usize,
    /// Synthetic frames pushed to bootstrap a mid-call window
    pub synthetic_frames: usize,
    /// Real calls that completed inside the window
    pub completed_calls: u64,
    /// Real calls still open at the end of the window
    pub orphans: usize,
    /// Exits whose function differs from the frame they closed
    pub mismatched_exits: u64,
}

/// Explicit-stack walker over an event window
///
/// Synthetic frames only ever sit below every real frame, so they are kept
/// as a count rather than materialized; a corrupt depth field cannot make the
/// walk allocate.
#[derive(Debug, Default)]
pub struct Replayer {
    stack: Vec<Frame>,
    synthetic: usize,
    summary: ReplaySummary,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    pub fn into_summary(self) -> ReplaySummary {
        self.summary
    }

    /// Walk `events` oldest to newest, feeding completed calls to `sink`
    ///
    /// Stops at the first exit with no open frame, or whose timestamp precedes
    /// its frame's entry, and returns `TraceCorruption`. Everything delivered to
    /// the sink up to that point stays valid.
    pub fn run<'a, I, S>(&mut self, events: I, sink: &mut S) -> Result<()>
    where
        I: IntoIterator<Item = &'a Event>,
        S: CallSink + ?Sized,
    {
        self.stack.clear();
        self.synthetic = 0;
        self.summary = ReplaySummary::default();

        let mut events = events.into_iter().peekable();
        if let Some(first) = events.peek() {
            self.synthetic = first.open_calls_before();
            self.summary.synthetic_frames = self.synthetic;
            self.summary.max_depth = self.synthetic;
        }

        for (position, event) in events.enumerate() {
            self.summary.events += 1;
            match event.kind {
                EventKind::Entry => self.replay_entry(event, sink),
                EventKind::Exit => self.replay_exit(position, event, sink)?,
            }
        }

        self.summary.orphans = self.stack.len();
        if self.summary.orphans > 0 {
            tracing::trace!(orphans = self.summary.orphans, "calls still open at end of window");
        }
        self.stack.clear();
        self.synthetic = 0;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.synthetic.saturating_add(self.stack.len())
    }

    fn replay_entry<S: CallSink + ?Sized>(&mut self, event: &Event, sink: &mut S) {
        sink.on_entry(event.function);
        self.stack.push(Frame {
            function: event.function,
            entered: event.timestamp,
            children: Duration::ZERO,
        });
        self.summary.max_depth = self.summary.max_depth.max(self.depth());
    }

    fn replay_exit<S: CallSink + ?Sized>(
        &mut self,
        position: usize,
        event: &Event,
        sink: &mut S,
    ) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            // Closes a call entered before the window began
            if self.synthetic == 0 {
                return Err(ProfError::TraceCorruption {
                    position,
                    kind: CorruptionKind::UnmatchedExit {
                        function: event.function,
                    },
                });
            }
            self.synthetic -= 1;
            return Ok(());
        };

        let elapsed = event.timestamp.diff(&frame.entered);
        let duration = elapsed.to_duration().ok_or(ProfError::TraceCorruption {
            position,
            kind: CorruptionKind::NegativeDuration {
                function: event.function,
                nanos: elapsed.as_nanos(),
            },
        })?;

        if frame.function != event.function {
            self.summary.mismatched_exits += 1;
            tracing::debug!(
                position,
                expected = %frame.function,
                found = %event.function,
                "exit does not match open frame"
            );
        }

        let parent = self.stack.last_mut().map(|caller| {
            caller.children = caller.children.saturating_add(duration);
            caller.function
        });

        sink.on_call(&CompletedCall {
            function: frame.function,
            parent,
            depth: self.depth(),
            entered: frame.entered,
            exited: event.timestamp,
            duration,
            children: frame.children.min(duration),
        });
        self.summary.completed_calls += 1;
        Ok(())
    }
}

/// Statistics built from one window
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub stats: StatsTable,
    pub summary: ReplaySummary,
}

/// A replay that hit corrupt data, with everything gathered before it
#[derive(Debug, thiserror::Error)]
#[error("Replay aborted after {} events: {error}", .partial.summary.events)]
pub struct ReplayAborted {
    pub partial: Replay,
    #[source]
    pub error: ProfError,
}

/// Rebuild per-function statistics from a chronological window
pub fn replay<'a, I>(events: I) -> std::result::Result<Replay, Box<ReplayAborted>>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut stats = StatsTable::new();
    let mut replayer = Replayer::new();
    let outcome = replayer.run(events, &mut stats);
    let replay = Replay {
        stats,
        summary: replayer.into_summary(),
    };

    match outcome {
        Ok(()) => Ok(replay),
        Err(error) => {
            tracing::warn!(%error, "replay aborted; returning partial statistics");
            Err(Box::new(ReplayAborted {
                partial: replay,
                error,
            }))
        }
    }
}

/// An event paired with the time elapsed since the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatedEvent {
    pub event: Event,
    /// Zero for the first event of the window
    pub delta: Timestamp,
}

/// Flat dump of a window: each event with its delta from the previous one
pub fn annotate<'a, I>(events: I) -> Vec<AnnotatedEvent>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut previous: Option<Timestamp> = None;
    events
        .into_iter()
        .map(|event| {
            let delta = previous.map_or(Timestamp::ZERO, |p| event.timestamp.diff(&p));
            previous = Some(event.timestamp);
            AnnotatedEvent {
                event: *event,
                delta,
            }
        })
        .collect()
}
