use std::fs;

use dlpwatch::actions::DeleteMode;
use dlpwatch::config::{Config, ConfigError};
use dlpwatch::scanner::HashAlgorithm;
use tempfile::tempdir;

#[test]
fn test_toml_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
watch_root = "/srv/share"
extensions = ["pdf", "xlsx"]
refresh_interval_secs = 10
hash_algorithm = "sha256"
delete_mode = "trash"
"#,
    )
    .unwrap();

    let config: Config = Config::figment(Some(&path)).extract().unwrap();
    assert_eq!(config.watch_root, std::path::PathBuf::from("/srv/share"));
    assert_eq!(config.extensions, vec!["pdf", "xlsx"]);
    assert_eq!(config.refresh_interval_secs, 10);
    assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
    assert_eq!(config.delete_mode, DeleteMode::Trash);
    // Untouched keys keep their defaults.
    assert_eq!(config.workers, Config::default().workers);
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 0\n").unwrap();

    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Invalid {
            field: "workers",
            ..
        })
    ));
}

#[test]
fn test_load_rejects_unknown_hash_algorithm() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "hash_algorithm = \"md5\"\n").unwrap();

    assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Load(_))));
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_load_from_path_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is = = not toml").unwrap();

    assert_eq!(Config::load_from_path(&path), Config::default());
}

#[test]
fn test_rendered_config_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = Config {
        workers: 8,
        ignore_patterns: vec!["*.part".into()],
        database_path: Some(dir.path().join("db.sqlite")),
        ..Config::default()
    };
    fs::write(&path, config.to_toml().unwrap()).unwrap();

    assert_eq!(Config::load(Some(&path)).unwrap(), config);
}
