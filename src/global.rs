//! Process-wide recorder driven by compiler instrumentation hooks
//!
//! Code compiled with `-finstrument-functions` calls
//! `__cyg_profile_func_enter` / `__cyg_profile_func_exit` around every
//! function. With the `cyg-profile` feature enabled this module exports those
//! symbols and routes them into one global [`Recorder`].
//!
//! Capture assumes a single instrumented thread. The hooks only `try_lock`
//! the recorder: an event arriving while another thread (or a re-entrant
//! hook) holds it is dropped and counted instead of blocking the program.

use crate::error::Result;
use crate::event::{CallSite, Event, FunctionAddr};
use crate::recorder::Recorder;
use crate::time::MonotonicClock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

static RECORDER: Mutex<Recorder<MonotonicClock>> = Mutex::new(Recorder::new(MonotonicClock));
static DROPPED: AtomicU64 = AtomicU64::new(0);

// A panic while holding the lock leaves the recorder itself consistent
fn lock() -> MutexGuard<'static, Recorder<MonotonicClock>> {
    RECORDER.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn try_record(f: impl FnOnce(&mut Recorder<MonotonicClock>)) {
    match RECORDER.try_lock() {
        Ok(mut guard) => f(&mut guard),
        Err(TryLockError::Poisoned(poisoned)) => f(&mut poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => {
            DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// (Re)allocate the global ring; see [`Recorder::init`]
pub fn init(capacity: i64) -> Result<()> {
    DROPPED.store(0, Ordering::Relaxed);
    lock().init(capacity)
}

pub fn enable() {
    lock().enable();
}

pub fn disable() {
    lock().disable();
}

pub fn reset() {
    lock().reset();
}

pub fn close() {
    lock().close();
}

pub fn on_enter(function: FunctionAddr, call_site: CallSite) {
    try_record(|r| r.on_enter(function, call_site));
}

pub fn on_exit(function: FunctionAddr, call_site: CallSite) {
    try_record(|r| r.on_exit(function, call_site));
}

/// Run `f` with exclusive access to the global recorder
///
/// Hooks firing on other threads meanwhile are dropped.
pub fn with_recorder<T>(f: impl FnOnce(&mut Recorder<MonotonicClock>) -> T) -> T {
    f(&mut lock())
}

/// Copy of the retained window, oldest first
pub fn snapshot() -> Vec<Event> {
    let events = lock().snapshot();
    let dropped = dropped_events();
    if dropped > 0 {
        tracing::warn!(dropped, "hook events dropped while the recorder was busy");
    }
    events
}

/// Hook events discarded because the recorder was busy
pub fn dropped_events() -> u64 {
    DROPPED.load(Ordering::Relaxed)
}

#[cfg(feature = "cyg-profile")]
#[no_mangle]
pub extern "C" fn __cyg_profile_func_enter(
    this_fn: *mut libc::c_void,
    call_site: *mut libc::c_void,
) {
    on_enter(
        FunctionAddr(this_fn as usize as u64),
        CallSite(call_site as usize as u64),
    );
}

#[cfg(feature = "cyg-profile")]
#[no_mangle]
pub extern "C" fn __cyg_profile_func_exit(
    this_fn: *mut libc::c_void,
    call_site: *mut libc::c_void,
) {
    on_exit(
        FunctionAddr(this_fn as usize as u64),
        CallSite(call_site as usize as u64),
    );
}
