use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use dlpwatch::cli::Cli;
use dlpwatch::config::Config;
use dlpwatch::error::ExitCode;
use dlpwatch::registry::Registry;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config_path: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("home/secure")).unwrap();
        let config = Config {
            watch_root: root.join("home"),
            ignore_paths: Vec::new(),
            database_path: Some(root.join("state/hash_store.db")),
            alert_log_path: Some(root.join("state/logs/alerts_log.txt")),
            ..Config::default()
        };
        let config_path = root.join("config.toml");
        fs::write(&config_path, config.to_toml().unwrap()).unwrap();
        Self { dir, config_path }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let config = self.config_path.to_string_lossy().into_owned();
        let mut argv = vec!["dlpwatch", "-q", "--config", config.as_str()];
        argv.extend_from_slice(args);
        dlpwatch::run_app(Cli::try_parse_from(argv).unwrap())
    }

    fn registry(&self) -> Registry {
        Registry::open(&self.root().join("state/hash_store.db")).unwrap()
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_register_list_unregister() {
    let ws = Workspace::new();
    let root = ws.root();
    let upload = root.join("home/report.pdf");
    fs::write(&upload, b"numbers").unwrap();
    let stale = root.join("home/old-report.pdf");
    fs::write(&stale, b"numbers").unwrap();

    let code = ws
        .run(&[
            "register",
            &arg(&upload),
            "--dir",
            &arg(&root.join("home/secure")),
        ])
        .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(root.join("home/secure/report.pdf").exists());
    assert!(!stale.exists());

    assert_eq!(ws.run(&["list"]).unwrap(), ExitCode::Success);
    assert_eq!(ws.run(&["list", "--json"]).unwrap(), ExitCode::Success);

    let id = ws.registry().list().unwrap()[0].id;
    assert_eq!(
        ws.run(&["unregister", &id.to_string()]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(ws.registry().count().unwrap(), 0);
}

#[test]
fn test_unregister_unknown_id_is_not_found() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["unregister", "4242"]).unwrap(), ExitCode::NotFound);
}

#[test]
fn test_register_into_missing_directory_fails() {
    let ws = Workspace::new();
    let root = ws.root();
    let upload = root.join("home/report.pdf");
    fs::write(&upload, b"numbers").unwrap();

    let err = ws
        .run(&[
            "register",
            &arg(&upload),
            "--dir",
            &arg(&root.join("nowhere")),
            "--no-sweep",
        ])
        .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::NotFound);
    assert!(upload.exists());
}

#[test]
fn test_alerts_list_and_clear() {
    let ws = Workspace::new();
    let log = ws.root().join("state/logs/alerts_log.txt");
    fs::create_dir_all(log.parent().unwrap()).unwrap();
    fs::write(&log, "one\n\ntwo\n\n").unwrap();

    assert_eq!(ws.run(&["alerts", "list"]).unwrap(), ExitCode::Success);
    assert_eq!(ws.run(&["alerts", "clear"]).unwrap(), ExitCode::Success);
    assert_eq!(fs::read_to_string(&log).unwrap(), "");
}

#[test]
fn test_config_command_prints_effective_config() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["config"]).unwrap(), ExitCode::Success);
}
