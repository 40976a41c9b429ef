//! Fixed-capacity event log that overwrites its oldest entry when full
//!
//! The ring keeps the hot path to a single slot store plus two counter bumps.
//! Nothing is ever allocated after construction.
//!
//! # Design
//!
//! ```text
//!   slots:  [ e5 | e6 | e2 | e3 | e4 ]      capacity = 5, total_recorded = 7
//!                       ^
//!                  write_cursor (next slot to overwrite, also the oldest event)
//!
//!   window (oldest -> newest): e2 e3 e4 e5 e6
//! ```
//!
//! While `total_recorded <= capacity` the retained events occupy slots
//! `[0, total_recorded)` in order. Once the ring has wrapped, exactly `capacity`
//! events are retained, the oldest at `write_cursor` and the newest just before
//! it. Callers never see that arithmetic: they ask for a [`Window`].

use crate::error::{ProfError, Result};
use crate::event::Event;
use std::iter::Chain;
use std::slice;

/// Circular store of captured events
#[derive(Debug, Clone)]
pub struct EventRing {
    /// Physical slots; length is the capacity and never changes
    slots: Vec<Event>,

    /// Next slot to write, always in `[0, capacity)`
    write_cursor: usize,

    /// Events pushed since construction or the last reset
    total_recorded: u64,
}

impl EventRing {
    /// Allocate a ring for `capacity` events
    ///
    /// Fails with `InvalidCapacity` for zero and `AllocationFailure` when the
    /// slot array cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ProfError::InvalidCapacity(0));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ProfError::AllocationFailure { capacity })?;
        slots.resize(capacity, Event::default());

        Ok(Self {
            slots,
            write_cursor: 0,
            total_recorded: 0,
        })
    }

    /// Store an event, overwriting the oldest one if the ring is full
    #[inline]
    pub fn push(&mut self, event: Event) {
        self.slots[self.write_cursor] = event;
        self.write_cursor += 1;
        if self.write_cursor == self.slots.len() {
            self.write_cursor = 0;
        }
        self.total_recorded += 1;
    }

    /// Forget every event but keep the allocation
    pub fn reset(&mut self) {
        self.write_cursor = 0;
        self.total_recorded = 0;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Number of events currently retained
    pub fn len(&self) -> usize {
        if self.total_recorded < self.slots.len() as u64 {
            self.total_recorded as usize
        } else {
            self.slots.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_recorded == 0
    }

    pub fn has_wrapped(&self) -> bool {
        self.total_recorded > self.slots.len() as u64
    }

    /// The retained events in chronological order
    pub fn window(&self) -> Window<'_> {
        if !self.has_wrapped() {
            Window {
                older: &self.slots[..self.len()],
                newer: &[],
            }
        } else {
            let (newer, older) = self.slots.split_at(self.write_cursor);
            Window { older, newer }
        }
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            total_recorded: self.total_recorded,
            overwritten: self.total_recorded - self.len() as u64,
            retained: self.len(),
            capacity: self.capacity(),
        }
    }
}

/// Chronological view of a ring's retained events
///
/// Like `VecDeque::as_slices`, the window is two contiguous runs: `older`
/// followed by `newer`. Either may be empty.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    older: &'a [Event],
    newer: &'a [Event],
}

impl<'a> Window<'a> {
    pub fn as_slices(&self) -> (&'a [Event], &'a [Event]) {
        (self.older, self.newer)
    }

    pub fn len(&self) -> usize {
        self.older.len() + self.newer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest retained event
    pub fn first(&self) -> Option<&'a Event> {
        self.older.first().or_else(|| self.newer.first())
    }

    pub fn iter(&self) -> WindowIter<'a> {
        self.older.iter().chain(self.newer.iter())
    }

    pub fn to_vec(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.len());
        events.extend_from_slice(self.older);
        events.extend_from_slice(self.newer);
        events
    }
}

/// Oldest-to-newest iterator over a window's two slices
pub type WindowIter<'a> = Chain<slice::Iter<'a, Event>, slice::Iter<'a, Event>>;

impl<'a> IntoIterator for Window<'a> {
    type Item = &'a Event;
    type IntoIter = WindowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStats {
    pub total_recorded: u64,
    pub overwritten: u64,
    pub retained: usize,
    pub capacity: usize,
}

impl RingStats {
    /// Fraction of recorded events lost to overwrite (0.0 to 1.0)
    pub fn overwrite_rate(&self) -> f64 {
        if self.total_recorded == 0 {
            0.0
        } else {
            self.overwritten as f64 / self.total_recorded as f64
        }
    }

    /// Fraction of slots holding a retained event (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.retained as f64 / self.capacity as f64
        }
    }
}
