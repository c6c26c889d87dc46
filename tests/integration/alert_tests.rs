use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dlpwatch::alerts::AlertDispatcher;
use tempfile::tempdir;

#[test]
fn test_concurrent_records_never_interleave() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("alerts_log.txt");
    let alerts = Arc::new(AlertDispatcher::new(&log).unwrap());
    let feed = alerts.subscribe();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let alerts = Arc::clone(&alerts);
            thread::spawn(move || {
                for i in 0..25 {
                    let message = format!("[t{t}] SECURITY ALERT (COPY): file {i}\nline two {i}");
                    alerts.record(&message).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = alerts.list().unwrap();
    assert_eq!(history.len(), 200);
    for block in &history {
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 2, "interleaved block: {block:?}");
        let index = lines[0].rsplit(' ').next().unwrap();
        assert_eq!(lines[1], format!("line two {index}"));
    }
    let unique: HashSet<&String> = history.iter().collect();
    assert_eq!(unique.len(), 200);

    // Live order matches log order (the log lists newest first).
    let live: Vec<String> = (0..200)
        .map(|_| feed.recv_timeout(Duration::from_secs(1)).unwrap())
        .collect();
    let mut oldest_first = history.clone();
    oldest_first.reverse();
    assert_eq!(live, oldest_first);
}

#[test]
fn test_log_format_is_blank_line_separated() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("logs/alerts_log.txt");
    let alerts = AlertDispatcher::new(&log).unwrap();

    alerts.record("first").unwrap();
    alerts.record("second\n").unwrap();

    assert_eq!(fs::read_to_string(&log).unwrap(), "first\n\nsecond\n\n");
    assert_eq!(alerts.list().unwrap(), vec!["second", "first"]);
}

#[test]
fn test_late_subscriber_gets_no_replay() {
    let dir = tempdir().unwrap();
    let alerts = AlertDispatcher::new(&dir.path().join("alerts_log.txt")).unwrap();

    alerts.record("before").unwrap();
    let feed = alerts.subscribe();
    alerts.record("after").unwrap();

    assert_eq!(feed.try_recv().as_deref(), Some("after"));
    assert_eq!(feed.try_recv(), None);
}

#[test]
fn test_every_subscriber_gets_every_message() {
    let dir = tempdir().unwrap();
    let alerts = AlertDispatcher::new(&dir.path().join("alerts_log.txt")).unwrap();
    let a = alerts.subscribe();
    let b = alerts.subscribe();

    alerts.record("one").unwrap();
    alerts.record("two").unwrap();

    for feed in [a, b] {
        assert_eq!(feed.try_recv().as_deref(), Some("one"));
        assert_eq!(feed.try_recv().as_deref(), Some("two"));
    }
}

#[test]
fn test_dropped_subscriber_is_pruned() {
    let dir = tempdir().unwrap();
    let alerts = AlertDispatcher::new(&dir.path().join("alerts_log.txt")).unwrap();
    let keep = alerts.subscribe();
    drop(alerts.subscribe());
    assert_eq!(alerts.subscriber_count(), 2);

    alerts.record("x").unwrap();
    assert_eq!(alerts.subscriber_count(), 1);
    assert_eq!(keep.try_recv().as_deref(), Some("x"));
}

#[test]
fn test_clear_keeps_queued_live_messages() {
    let dir = tempdir().unwrap();
    let alerts = AlertDispatcher::new(&dir.path().join("alerts_log.txt")).unwrap();
    let feed = alerts.subscribe();

    alerts.record("queued").unwrap();
    alerts.clear().unwrap();

    assert!(alerts.list().unwrap().is_empty());
    assert_eq!(feed.try_recv().as_deref(), Some("queued"));

    alerts.record("fresh").unwrap();
    assert_eq!(alerts.list().unwrap(), vec!["fresh"]);
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("alerts_log.txt");
    AlertDispatcher::new(&log).unwrap().record("persisted").unwrap();

    let reopened = AlertDispatcher::new(&log).unwrap();
    assert_eq!(reopened.list().unwrap(), vec!["persisted"]);
}
