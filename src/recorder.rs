//! Event recorder: the capture side of the profiler
//!
//! A `Recorder` owns one ring buffer, the enable gate, and the current nesting
//! level. The instrumentation hook calls [`Recorder::on_enter`] and
//! [`Recorder::on_exit`] on every call boundary of the measured program; those
//! paths sample the clock, store one event, and bump counters. They never
//! allocate and never fail.
//!
//! Depth convention: the level is incremented only after an entry is stored
//! and decremented only before an exit is stored, so the entry and exit of one
//! call carry the same depth.
//!
//! # Example
//!
//! ```
//! use miniprof::recorder::Recorder;
//! use miniprof::event::{CallSite, FunctionAddr};
//! use miniprof::time::MonotonicClock;
//!
//! let mut recorder = Recorder::new(MonotonicClock);
//! recorder.init(64).unwrap();
//! recorder.enable();
//!
//! recorder.on_enter(FunctionAddr(0x1000), CallSite(0x2000));
//! recorder.on_exit(FunctionAddr(0x1000), CallSite(0x2000));
//!
//! assert_eq!(recorder.max_depth(), 1);
//! assert_eq!(recorder.snapshot().len(), 2);
//! ```

use crate::error::{ProfError, Result};
use crate::event::{CallSite, Event, EventKind, FunctionAddr};
use crate::persistence;
use crate::ring_buffer::{EventRing, RingStats, Window};
use crate::time::Clock;
use std::path::Path;

/// Default ring capacity when none is configured
pub const DEFAULT_CAPACITY: usize = 4096;

/// Recorder settings
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Number of events retained (must be positive)
    pub capacity: usize,
    /// Open the capture gate right after initialization
    pub start_enabled: bool,
    /// Echo every captured event at TRACE level (slow, debugging only)
    pub trace_events: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            start_enabled: false,
            trace_events: false,
        }
    }
}

impl RecorderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = enabled;
        self
    }

    pub fn with_event_tracing(mut self, trace: bool) -> Self {
        self.trace_events = trace;
        self
    }
}

/// Captures call events into a ring buffer
#[derive(Debug)]
pub struct Recorder<C: Clock> {
    clock: C,
    ring: Option<EventRing>,
    enabled: bool,
    level: u32,
    max_depth: u32,
    trace_events: bool,
}

impl<C: Clock> Recorder<C> {
    /// A closed, disabled recorder; call [`init`](Self::init) before capturing
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            ring: None,
            enabled: false,
            level: 0,
            max_depth: 0,
            trace_events: false,
        }
    }

    /// Build and initialize a recorder from settings
    pub fn with_config(clock: C, config: &RecorderConfig) -> Result<Self> {
        let mut recorder = Self::new(clock);
        let capacity = i64::try_from(config.capacity).unwrap_or(i64::MAX);
        recorder.init(capacity)?;
        recorder.trace_events = config.trace_events;
        if config.start_enabled {
            recorder.enable();
        }
        Ok(recorder)
    }

    /// Allocate a ring of `capacity` events
    ///
    /// An already initialized recorder is closed first. On failure the
    /// recorder is left closed.
    pub fn init(&mut self, capacity: i64) -> Result<()> {
        if self.ring.is_some() {
            self.close();
        }
        let slots = match usize::try_from(capacity) {
            Ok(n) if n > 0 => n,
            _ => return Err(ProfError::InvalidCapacity(capacity)),
        };

        self.ring = Some(EventRing::with_capacity(slots)?);
        self.level = 0;
        self.max_depth = 0;
        tracing::debug!(capacity = slots, "recorder initialized");
        Ok(())
    }

    /// Release the ring and clear every counter; safe to call at any time
    pub fn close(&mut self) {
        if self.ring.take().is_some() {
            tracing::debug!("recorder closed");
        }
        self.level = 0;
        self.max_depth = 0;
    }

    /// Forget captured events and counters, keeping the allocation
    pub fn reset(&mut self) {
        if let Some(ring) = self.ring.as_mut() {
            ring.reset();
        }
        self.level = 0;
        self.max_depth = 0;
        tracing::debug!("recorder reset");
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.ring.is_some()
    }

    pub fn set_trace_events(&mut self, trace: bool) {
        self.trace_events = trace;
    }

    /// Capture one call boundary
    ///
    /// A no-op while closed or disabled: neither the ring nor any counter moves.
    #[inline]
    pub fn record_event(&mut self, kind: EventKind, function: FunctionAddr, call_site: CallSite) {
        if !self.enabled {
            return;
        }
        let Some(ring) = self.ring.as_mut() else {
            return;
        };

        if kind == EventKind::Exit {
            self.level = self.level.saturating_sub(1);
        }
        let event = Event {
            timestamp: self.clock.now(),
            function,
            call_site,
            kind,
            depth: self.level,
        };
        ring.push(event);
        if kind == EventKind::Entry {
            self.level = self.level.saturating_add(1);
        }
        if self.level > self.max_depth {
            self.max_depth = self.level;
        }

        if self.trace_events {
            tracing::trace!(
                kind = %event.kind,
                depth = event.depth,
                function = %event.function,
                call_site = %event.call_site,
                secs = event.timestamp.secs(),
                nanos = event.timestamp.subsec_nanos(),
                "event"
            );
        }
    }

    #[inline]
    pub fn on_enter(&mut self, function: FunctionAddr, call_site: CallSite) {
        self.record_event(EventKind::Entry, function, call_site);
    }

    #[inline]
    pub fn on_exit(&mut self, function: FunctionAddr, call_site: CallSite) {
        self.record_event(EventKind::Exit, function, call_site);
    }

    /// Highest nesting level seen since the last `init` or `reset`
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Current nesting level
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn capacity(&self) -> Option<usize> {
        self.ring.as_ref().map(EventRing::capacity)
    }

    pub fn write_cursor(&self) -> usize {
        self.ring.as_ref().map_or(0, EventRing::write_cursor)
    }

    pub fn total_recorded(&self) -> u64 {
        self.ring.as_ref().map_or(0, EventRing::total_recorded)
    }

    pub fn ring_stats(&self) -> Option<RingStats> {
        self.ring.as_ref().map(EventRing::stats)
    }

    /// Borrow the retained window (`None` while closed)
    pub fn window(&self) -> Option<Window<'_>> {
        self.ring.as_ref().map(EventRing::window)
    }

    /// Copy of the retained events, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.window().map(|w| w.to_vec()).unwrap_or_default()
    }

    /// Write the retained window to a trace file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let events = self.snapshot();
        persistence::save(path, &events)
    }

    /// Re-initialize and fill the ring with a previously captured window
    ///
    /// The capacity is the larger of the current one and the window length, so
    /// a later [`snapshot`](Self::snapshot) returns `events` unchanged. The
    /// gate is left as it was.
    pub fn restore(&mut self, events: &[Event]) -> Result<()> {
        let capacity = self.capacity().unwrap_or(0).max(events.len());
        self.init(i64::try_from(capacity).unwrap_or(i64::MAX))?;

        let ring = self.ring.as_mut().ok_or(ProfError::InvalidCapacity(0))?;
        for event in events {
            ring.push(*event);
            self.max_depth = self.max_depth.max(event.level_after());
        }
        self.level = events.last().map_or(0, Event::level_after);
        tracing::debug!(events = events.len(), capacity, "recorder restored");
        Ok(())
    }
}
