//! Trace file round trips through the filesystem

use miniprof::event::{CallSite, FunctionAddr};
use miniprof::persistence::{self, HEADER_SIZE, MAX_EVENTS, RECORD_SIZE};
use miniprof::recorder::Recorder;
use miniprof::replay::replay;
use miniprof::time::{ManualClock, Timestamp};
use miniprof::ProfError;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn captured(capacity: i64, calls: u64) -> Recorder<ManualClock> {
    let clock = ManualClock::new(Timestamp::new(7, 999_999_000), Duration::from_nanos(333));
    let mut recorder = Recorder::new(clock);
    recorder.init(capacity).unwrap();
    recorder.enable();
    for i in 0..calls {
        recorder.on_enter(FunctionAddr(0x4000 + i % 3), CallSite(0x5000 + i));
        recorder.on_enter(FunctionAddr(0x6000), CallSite(0x4000 + i % 3));
        recorder.on_exit(FunctionAddr(0x6000), CallSite(0x4000 + i % 3));
        recorder.on_exit(FunctionAddr(0x4000 + i % 3), CallSite(0x5000 + i));
    }
    recorder
}

#[test]
fn test_save_then_load_restores_identical_window() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("trace.bin");

    let original = captured(16, 3);
    original.save(&path).unwrap();

    let mut restored = Recorder::new(ManualClock::frozen(Timestamp::ZERO));
    restored.init(16).unwrap();
    restored.restore(&persistence::load(&path).unwrap()).unwrap();

    assert_eq!(restored.snapshot(), original.snapshot());
    assert_eq!(restored.max_depth(), original.max_depth());
    assert_eq!(restored.capacity(), Some(16));
}

#[test]
fn test_wrapped_window_round_trip_replays_the_same() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wrapped.bin");

    // 40 events into 10 slots; window opens mid-call
    let original = captured(10, 10);
    original.save(&path).unwrap();
    let loaded = persistence::load(&path).unwrap();
    assert_eq!(loaded, original.snapshot());

    let before = replay(&original.snapshot()).unwrap();
    let after = replay(&loaded).unwrap();
    assert_eq!(before.summary, after.summary);
    for (addr, stat) in before.stats.iter() {
        assert_eq!(after.stats.get(addr), Some(stat));
    }
}

#[test]
fn test_file_size_matches_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sized.bin");
    let rec = captured(64, 2);
    rec.save(&path).unwrap();
    let len = fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(len, HEADER_SIZE + 8 * RECORD_SIZE);
}

#[test]
fn test_empty_window_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("empty.bin");
    let rec = captured(4, 0);
    rec.save(&path).unwrap();
    assert!(persistence::load(&path).unwrap().is_empty());
}

#[test]
fn test_load_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = persistence::load(temp.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, ProfError::Io { .. }));
    assert!(err.to_string().contains("absent.bin"));
}

#[test]
fn test_save_into_missing_directory_is_io_error() {
    let temp = TempDir::new().unwrap();
    let rec = captured(4, 1);
    let err = rec.save(temp.path().join("no/such/dir/t.bin")).unwrap_err();
    assert!(matches!(err, ProfError::Io { .. }));
}

#[test]
fn test_truncated_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cut.bin");
    captured(16, 2).save(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    let err = persistence::load(&path).unwrap_err();
    assert!(matches!(
        err,
        ProfError::TruncatedFile {
            expected: 8,
            read: 7
        }
    ));
}

#[test]
fn test_oversized_header_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("huge.bin");
    fs::write(&path, (MAX_EVENTS + 1).to_le_bytes()).unwrap();
    assert!(matches!(
        persistence::load(&path),
        Err(ProfError::CorruptFile(_))
    ));
}
