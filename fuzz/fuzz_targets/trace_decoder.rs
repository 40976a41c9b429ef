#![no_main]

use libfuzzer_sys::fuzz_target;
use miniprof::persistence;
use miniprof::replay::replay;

fuzz_target!(|data: &[u8]| {
    // Untrusted trace files must decode or fail cleanly, never panic
    if let Ok(events) = persistence::decode(data) {
        // A decoded window may be nonsense; replay must still terminate
        let _ = replay(&events);
    }
});
