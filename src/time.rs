//! Monotonic timestamps and unit conversion
//!
//! Timestamps are kept as signed seconds plus nanoseconds, the same split the
//! kernel hands back from `clock_gettime`. Every constructor normalizes so that
//! `nanos` stays in `[0, 1_000_000_000)`; a negative span is therefore carried
//! entirely by the seconds field (`-1.25s` is `secs = -2, nanos = 750_000_000`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

pub const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point on (or a signed distance along) the monotonic time line
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Build a timestamp, carrying any whole seconds out of `nanos`
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self {
            secs: secs.saturating_add(i64::from(nanos / NANOS_PER_SEC)),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Build from a signed nanosecond count
    pub fn from_nanos(nanos: i128) -> Self {
        let per_sec = i128::from(NANOS_PER_SEC);
        let secs = nanos.div_euclid(per_sec);
        let rem = nanos.rem_euclid(per_sec);
        Self {
            secs: i64::try_from(secs).unwrap_or(if secs < 0 { i64::MIN } else { i64::MAX }),
            nanos: rem as u32,
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        Self {
            secs: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            nanos: d.subsec_nanos(),
        }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    pub fn as_nanos(&self) -> i128 {
        i128::from(self.secs) * i128::from(NANOS_PER_SEC) + i128::from(self.nanos)
    }

    pub fn is_negative(&self) -> bool {
        self.secs < 0
    }

    /// `self - earlier`, borrowing a second when the nanosecond field underflows
    pub fn diff(&self, earlier: &Timestamp) -> Timestamp {
        if self.nanos < earlier.nanos {
            Timestamp {
                secs: self.secs.saturating_sub(earlier.secs).saturating_sub(1),
                nanos: NANOS_PER_SEC + self.nanos - earlier.nanos,
            }
        } else {
            Timestamp {
                secs: self.secs.saturating_sub(earlier.secs),
                nanos: self.nanos - earlier.nanos,
            }
        }
    }

    /// `self + other`, carrying nanosecond overflow into seconds
    pub fn sum(&self, other: &Timestamp) -> Timestamp {
        let nanos = self.nanos + other.nanos;
        let carry = i64::from(nanos >= NANOS_PER_SEC);
        Timestamp {
            secs: self.secs.saturating_add(other.secs).saturating_add(carry),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Non-negative spans convert to a `Duration`; negative ones do not
    pub fn to_duration(&self) -> Option<Duration> {
        let secs = u64::try_from(self.secs).ok()?;
        Some(Duration::new(secs, self.nanos))
    }

    pub fn as_unit(&self, unit: TimeUnit) -> f64 {
        self.as_nanos() as f64 / unit.nanos_per_unit()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            let magnitude = Timestamp::from_nanos(-self.as_nanos());
            write!(f, "-{}.{:09}", magnitude.secs, magnitude.nanos)
        } else {
            write!(f, "{}.{:09}", self.secs, self.nanos)
        }
    }
}

/// Display unit for durations in reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize)]
pub enum TimeUnit {
    #[value(name = "s")]
    #[serde(rename = "s")]
    Seconds,
    #[value(name = "ms")]
    #[serde(rename = "ms")]
    Millis,
    #[default]
    #[value(name = "us")]
    #[serde(rename = "us")]
    Micros,
    #[value(name = "ns")]
    #[serde(rename = "ns")]
    Nanos,
}

impl TimeUnit {
    fn nanos_per_unit(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1e9,
            TimeUnit::Millis => 1e6,
            TimeUnit::Micros => 1e3,
            TimeUnit::Nanos => 1.0,
        }
    }

    pub fn convert(self, d: Duration) -> f64 {
        d.as_nanos() as f64 / self.nanos_per_unit()
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
        }
    }

    /// Fractional digits worth printing at this unit
    pub fn precision(self) -> usize {
        match self {
            TimeUnit::Seconds => 9,
            TimeUnit::Millis => 6,
            TimeUnit::Micros => 3,
            TimeUnit::Nanos => 0,
        }
    }
}

/// Source of monotonic timestamps
///
/// `now` sits on the capture hot path: implementations must not allocate or
/// block, and must always return a value.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// The raw hardware monotonic clock (`CLOCK_MONOTONIC_RAW` on Linux)
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

#[cfg(any(target_os = "linux", target_os = "android"))]
const CLOCK_ID: nix::time::ClockId = nix::time::ClockId::CLOCK_MONOTONIC_RAW;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const CLOCK_ID: nix::time::ClockId = nix::time::ClockId::CLOCK_MONOTONIC;

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        match nix::time::clock_gettime(CLOCK_ID) {
            Ok(ts) => Timestamp::new(i64::from(ts.tv_sec()), ts.tv_nsec() as u32),
            Err(_) => fallback_now(),
        }
    }
}

static FALLBACK_EPOCH: OnceLock<Instant> = OnceLock::new();

fn fallback_now() -> Timestamp {
    Timestamp::from_duration(FALLBACK_EPOCH.get_or_init(Instant::now).elapsed())
}

/// Deterministic clock that advances by a fixed step on every sample
///
/// Clones share the same time line, so a test can keep a handle and move time
/// while a recorder owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ns: Arc<AtomicI64>,
    step_ns: i64,
}

impl ManualClock {
    pub fn new(start: Timestamp, step: Duration) -> Self {
        Self {
            now_ns: Arc::new(AtomicI64::new(start.as_nanos() as i64)),
            step_ns: step.as_nanos() as i64,
        }
    }

    /// A clock that only moves when told to
    pub fn frozen(start: Timestamp) -> Self {
        Self::new(start, Duration::ZERO)
    }

    pub fn advance(&self, by: Duration) {
        self.now_ns.fetch_add(by.as_nanos() as i64, Ordering::Relaxed);
    }

    pub fn set(&self, to: Timestamp) {
        self.now_ns.store(to.as_nanos() as i64, Ordering::Relaxed);
    }

    pub fn peek(&self) -> Timestamp {
        Timestamp::from_nanos(i128::from(self.now_ns.load(Ordering::Relaxed)))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let ns = self.now_ns.fetch_add(self.step_ns, Ordering::Relaxed);
        Timestamp::from_nanos(i128::from(ns))
    }
}
