use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use dlpwatch::actions::{DeleteMode, Remediator};
use dlpwatch::alerts::AlertOutcome;
use dlpwatch::engine::{Engine, WatchOptions};
use dlpwatch::monitor::PathHandler;
use dlpwatch::policy::{Violation, ViolationKind};

use super::common::{hasher, TestEnv};

const REPORT: &[u8] = b"%PDF-1.7 quarterly figures";

#[test]
fn test_file_in_allowed_directory_is_permitted() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    let original = env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    assert!(env.engine.process(&original).is_none());
    assert!(original.exists());
    assert!(env.alerts.list().unwrap().is_empty());
}

#[test]
fn test_descendant_of_allowed_directory_is_permitted() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    let archived = env.write("secure/2024/q1/report-copy.pdf", REPORT);
    assert!(env.engine.process(&archived).is_none());
    assert!(archived.exists());
}

#[test]
fn test_sibling_with_shared_prefix_is_not_permitted() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    let stray = env.write("secure-old/report.pdf", REPORT);
    let alert = env.engine.process(&stray).unwrap();
    assert_eq!(alert.kind, ViolationKind::Copy);
    assert!(!stray.exists());
}

#[test]
fn test_copy_is_deleted_with_one_alert() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    let original = env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    let copy = env.write("tmp/report.pdf", REPORT);
    let alert = env.engine.process(&copy).unwrap();

    assert_eq!(alert.kind, ViolationKind::Copy);
    assert_eq!(alert.outcome, AlertOutcome::Deleted);
    assert!(!copy.exists());
    assert_eq!(fs::read(&original).unwrap(), REPORT);

    let history = env.alerts.list().unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].contains("SECURITY ALERT (COPY)"));
    assert!(history[0].contains(&copy.display().to_string()));
    assert!(history[0].contains("Deleted copy"));
}

#[test]
fn test_copy_under_another_name_is_still_a_copy() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    let renamed = env.write("Downloads/innocent.pdf", REPORT);
    let alert = env.engine.process(&renamed).unwrap();
    assert_eq!(alert.kind, ViolationKind::Copy);
    assert!(!renamed.exists());
}

#[test]
fn test_moved_original_is_restored() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.protect(&secure, "report.pdf", REPORT);

    let moved = env.write("tmp/report.pdf", REPORT);
    let alert = env.engine.process(&moved).unwrap();

    let expected = secure.join("report.pdf");
    assert_eq!(alert.kind, ViolationKind::Move);
    assert_eq!(
        alert.outcome,
        AlertOutcome::Restored {
            target: expected.clone(),
            renamed: false
        }
    );
    assert!(!moved.exists());
    assert_eq!(fs::read(&expected).unwrap(), REPORT);

    let history = env.alerts.list().unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].contains("SECURITY ALERT (MOVE)"));
    assert!(history[0].contains("Restored to"));
}

#[test]
fn test_restored_file_is_then_permitted() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.protect(&secure, "report.pdf", REPORT);

    let moved = env.write("tmp/report.pdf", REPORT);
    env.engine.process(&moved).unwrap();

    assert!(env.engine.process(&secure.join("report.pdf")).is_none());
    assert_eq!(env.alerts.list().unwrap().len(), 1);
}

#[test]
fn test_move_race_restores_with_suffix_and_updates_registry() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    let hash = env.protect(&secure, "report.pdf", REPORT);

    // Classified as a move while the expected path was free...
    let moved = env.write("tmp/report.pdf", REPORT);
    let violation = Violation {
        path: moved.clone(),
        hash: hash.clone(),
        kind: ViolationKind::Move,
        entry: env.cache.lookup(&hash).unwrap(),
    };
    // ...then another file takes the name before the restore runs.
    env.write("secure/report.pdf", b"someone else's report");

    let remediator = Remediator::new(env.cache.clone(), DeleteMode::Permanent);
    let target = secure.join("report_1.pdf");
    assert_eq!(
        remediator.remediate(&violation),
        AlertOutcome::Restored {
            target: target.clone(),
            renamed: true
        }
    );
    assert!(!moved.exists());
    assert_eq!(fs::read(&target).unwrap(), REPORT);
    assert_eq!(
        fs::read(secure.join("report.pdf")).unwrap(),
        b"someone else's report"
    );
    assert_eq!(
        env.registry.find_by_hash(&hash).unwrap().unwrap().filename,
        "report_1.pdf"
    );

    // Visible to evaluation after the next refresh.
    env.cache.refresh().unwrap();
    assert_eq!(env.cache.lookup(&hash).unwrap().filename, "report_1.pdf");
    assert!(env.engine.process(&target).is_none());
}

#[test]
fn test_untracked_files_never_alert() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.protect(&secure, "report.pdf", REPORT);

    for rel in ["tmp/a.pdf", "secure/b.pdf", "Downloads/c.txt"] {
        let path = env.write(rel, b"not protected");
        assert!(env.engine.process(&path).is_none());
        assert!(path.exists());
    }
    assert!(env.alerts.list().unwrap().is_empty());
}

#[test]
fn test_restore_into_missing_directory_fails_without_touching_file() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.protect(&secure, "report.pdf", REPORT);
    fs::remove_dir(&secure).unwrap();

    let moved = env.write("tmp/report.pdf", REPORT);
    let alert = env.engine.process(&moved).unwrap();

    assert!(matches!(alert.outcome, AlertOutcome::RestoreFailed { .. }));
    assert!(moved.exists());
    assert!(env.alerts.list().unwrap()[0].contains("RESTORE FAILED"));
}

#[test]
fn test_vanished_and_special_paths_are_swallowed() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.protect(&secure, "report.pdf", REPORT);

    env.engine.handle_path(&env.path("tmp/never-existed.pdf"));
    env.engine.handle_path(&env.mkdir("tmp/dir.pdf"));
    assert!(env.alerts.list().unwrap().is_empty());
}

#[test]
fn test_trash_mode_leaves_trashed_copies_alone() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);
    let engine = Engine::new(
        env.cache.clone(),
        hasher(),
        DeleteMode::Trash,
        env.alerts.clone(),
    );

    // Where the platform trash puts a copy deleted from this volume.
    let trashed = env.write("mnt/.Trash-1000/files/report.pdf", REPORT);
    assert!(engine.process(&trashed).is_none());
    assert!(trashed.exists());
    assert!(env.alerts.list().unwrap().is_empty());

    // Permanent mode still treats it as a stray copy.
    let alert = env.engine.process(&trashed).unwrap();
    assert_eq!(alert.kind, ViolationKind::Copy);
    assert!(!trashed.exists());
}

#[cfg(unix)]
#[test]
fn test_symlink_to_protected_content_is_ignored() {
    let env = TestEnv::new();
    let secure = env.mkdir("secure");
    let original = env.write("secure/report.pdf", REPORT);
    env.protect(&secure, "report.pdf", REPORT);

    env.mkdir("tmp");
    let link = env.path("tmp/report.pdf");
    std::os::unix::fs::symlink(&original, &link).unwrap();

    assert!(env.engine.process(&link).is_none());
    assert!(fs::symlink_metadata(&link).is_ok());
    assert!(original.exists());
}

#[test]
fn test_live_watch_deletes_copy() {
    let env = TestEnv::new();
    let home = env.mkdir("home");
    let secure = env.mkdir("home/secure");
    env.write("home/secure/report.pdf", REPORT);
    env.mkdir("home/Desktop");
    env.protect(&secure, "report.pdf", REPORT);

    let session = env
        .engine
        .start(&WatchOptions {
            root: home.clone(),
            extensions: vec!["pdf".into()],
            ignore_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            workers: 2,
            refresh_interval: Duration::from_secs(1),
        })
        .unwrap();
    let feed = env.alerts.subscribe();

    let copy = env.path("home/Desktop/report.pdf");
    fs::write(&copy, REPORT).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while copy.exists() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(25));
    }
    let message = feed.recv_timeout(Duration::from_secs(5));
    session.stop();

    assert!(!copy.exists(), "watcher did not remove the copy");
    assert!(secure.join("report.pdf").exists());
    assert!(message.unwrap().contains("SECURITY ALERT (COPY)"));
}
