//! Integration tests for the store lifecycle.
//!
//! These tests exercise the flow from open through append, reopen and
//! reinitialization, including two handles mapping the same file the way two
//! processes would.

use std::fs;
use std::sync::Arc;
use std::thread;

use ringlog::slab::FILE_SIZE;
use ringlog::{CAPACITY, LINE_CAPACITY, Store};
use tempfile::tempdir;

#[test]
fn test_full_store_lifecycle() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("lifecycle.log");

    let base_time = 1_700_000_000_000_000_000u64;

    // Phase 1: Create the log and write some lines
    {
        let store = Store::open(&path).unwrap();
        assert!(store.was_reinitialized());

        for i in 0u64..60 {
            store.append_at("APP", &format!("event {i}"), base_time + i * 1_000);
        }
        store.close();
    }

    // Phase 2: Reopen and verify the lines persisted
    {
        let store = Store::open(&path).unwrap();
        assert!(!store.was_reinitialized());
        assert_eq!(store.next_index(), 60);

        let lines: Vec<_> = store.snapshot().iter().collect();
        assert_eq!(lines.len(), 60);
        assert_eq!(lines[0].text(), "[APP] event 0");
        assert_eq!(lines[0].timestamp_ns(), base_time);
        assert_eq!(lines[59].text(), "[APP] event 59");
    }

    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_SIZE as u64);
}

#[test]
fn test_wraparound_keeps_newest_capacity_lines() {
    let temp_dir = tempdir().unwrap();
    let store = Store::open(temp_dir.path().join("wrap.log")).unwrap();

    let k = 25u64;
    let total = CAPACITY as u64 + k;
    for i in 0..total {
        store.append_at("T", &format!("line {i}"), i + 1);
    }

    let lines: Vec<_> = store.snapshot().iter().collect();
    assert_eq!(lines.len(), CAPACITY);

    // Oldest k evicted first; the survivors are k..capacity+k-1, in order.
    for (offset, line) in lines.iter().enumerate() {
        assert_eq!(line.text(), format!("[T] line {}", k + offset as u64));
    }
}

#[test]
fn test_foreign_file_is_reset() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("foreign.log");
    fs::write(&path, vec![0xC3u8; FILE_SIZE]).unwrap();

    let store = Store::open(&path).unwrap();

    assert!(store.was_reinitialized());
    assert_eq!(store.next_index(), 0);
    assert!(store.snapshot().is_empty());

    // The healed file now reads back as a valid log.
    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"RLOG");
    drop(store);
    assert!(!Store::open(&path).unwrap().was_reinitialized());
}

#[test]
fn test_truncated_file_is_reset() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("short.log");

    {
        let store = Store::open(&path).unwrap();
        store.append_at("T", "will be lost", 1);
    }
    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(4096).unwrap();
    drop(file);

    let store = Store::open(&path).unwrap();
    assert!(store.was_reinitialized());
    assert!(store.snapshot().is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), FILE_SIZE as u64);
}

#[test]
fn test_long_message_is_truncated() {
    let temp_dir = tempdir().unwrap();
    let store = Store::open(temp_dir.path().join("long.log")).unwrap();

    let message = "0123456789".repeat(100);
    store.append_at("NET", &message, 1);
    store.append_at("NET", "next line intact", 2);

    let lines: Vec<_> = store.snapshot().iter().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text().len(), LINE_CAPACITY - 1);
    assert!(lines[0].text().starts_with("[NET] 0123456789"));
    assert_eq!(lines[1].text(), "[NET] next line intact");
}

#[test]
fn test_two_handles_share_one_log() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("shared.log");

    let app = Store::open(&path).unwrap();
    let tunnel = Store::open(&path).unwrap();

    app.append_at("APP", "from app", 1);
    tunnel.append_at("NET", "from tunnel", 2);
    app.append_at("APP", "from app again", 3);

    for store in [&app, &tunnel] {
        let texts: Vec<_> = store
            .snapshot()
            .iter()
            .map(|line| line.text().to_string())
            .collect();
        assert_eq!(
            texts,
            vec!["[APP] from app", "[NET] from tunnel", "[APP] from app again"]
        );
    }

    // Closing one handle leaves the other working.
    app.close();
    tunnel.append_at("NET", "still here", 4);
    assert_eq!(tunnel.next_index(), 4);
}

#[test]
fn test_concurrent_writers_on_separate_handles() {
    let temp_dir = tempdir().unwrap();
    let path = Arc::new(temp_dir.path().join("concurrent.log"));

    // Create once so no writer races the initialization.
    Store::open(path.as_ref()).unwrap().close();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                let store = Store::open(path.as_ref()).unwrap();
                for i in 0..250 {
                    store.append(&format!("P{w}"), &format!("{i}"));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let store = Store::open(path.as_ref()).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.next_index(), 1000);
    assert_eq!(snapshot.live_len(), 1000);

    for w in 0..4 {
        let prefix = format!("[P{w}] ");
        let count = snapshot
            .iter()
            .filter(|line| line.text().starts_with(&prefix))
            .count();
        assert_eq!(count, 250);
    }
}
