//! dlpwatch - data-leak-prevention watcher
//!
//! Registers sensitive files by content hash and an allowed directory,
//! watches a filesystem tree, and reacts when protected content shows up
//! elsewhere: stray copies are deleted, moved originals are restored, and
//! every violation is written to an alert log and a live alert feed.

pub mod actions;
pub mod alerts;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod policy;
pub mod register;
pub mod registry;
pub mod scanner;
pub mod signal;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::actions::DeleteMode;
use crate::alerts::AlertDispatcher;
use crate::cli::{AlertsCommand, Cli, Commands, ListArgs, RegisterArgs, WatchArgs};
use crate::config::Config;
use crate::engine::{Engine, WatchOptions};
use crate::error::ExitCode;
use crate::register::{register_file, RegisterOptions};
use crate::registry::{RecordSource, Registry, RegistryCache};
use crate::scanner::Hasher;

/// How long the watch loop waits between shutdown checks.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Run the command described by `cli`.
///
/// # Errors
///
/// Configuration, registry, alert-log or monitor failures. Policy
/// violations and remediation failures are never errors.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Watch(args) => run_watch(config, args),
        Commands::Register(args) => run_register(&config, &args),
        Commands::List(args) => run_list(&config, &args),
        Commands::Unregister(args) => run_unregister(&config, args.id),
        Commands::Alerts(AlertsCommand::List(args)) => run_alerts_list(&config, &args),
        Commands::Alerts(AlertsCommand::Clear) => {
            open_alerts(&config)?.clear().context("failed to clear alert log")?;
            println!("Alert log cleared");
            Ok(ExitCode::Success)
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

fn open_registry(config: &Config) -> Result<Registry> {
    let path = config.database_path();
    Registry::open(&path).with_context(|| format!("failed to open registry at {}", path.display()))
}

fn open_alerts(config: &Config) -> Result<AlertDispatcher> {
    let path = config.alert_log_path();
    AlertDispatcher::new(&path)
        .with_context(|| format!("failed to open alert log at {}", path.display()))
}

fn run_watch(mut config: Config, args: WatchArgs) -> Result<ExitCode> {
    if let Some(root) = args.root {
        config.watch_root = root;
    }
    if let Some(workers) = args.workers {
        config.workers = usize::try_from(workers).unwrap_or(usize::MAX);
    }
    if let Some(secs) = args.refresh_interval {
        config.refresh_interval_secs = secs;
    }
    if args.trash {
        config.delete_mode = DeleteMode::Trash;
    }
    config.ignore_patterns.extend(args.ignore_patterns);
    config.validate()?;

    let root = config
        .watch_root
        .canonicalize()
        .with_context(|| format!("watch root {} is not accessible", config.watch_root.display()))?;

    let registry: Arc<dyn RecordSource> = Arc::new(open_registry(&config)?);
    let cache = Arc::new(RegistryCache::new(registry));
    let alerts = Arc::new(open_alerts(&config)?);
    let engine = Arc::new(Engine::new(
        cache,
        Hasher::new(config.hash_algorithm),
        config.delete_mode,
        alerts,
    ));

    let mut ignore_paths = config.ignore_paths.clone();
    ignore_paths.extend(config.self_paths());
    let options = WatchOptions {
        root,
        extensions: config.extensions.clone(),
        ignore_paths,
        ignore_patterns: config.ignore_patterns.clone(),
        workers: config.workers,
        refresh_interval: Duration::from_secs(config.refresh_interval_secs),
    };

    let shutdown = signal::install_handler()?;
    let session = engine.start(&options).context("failed to start watching")?;
    log::info!(
        "Enforcing policy under {} (refresh every {}s). Press Ctrl+C to stop.",
        session.root().display(),
        config.refresh_interval_secs
    );

    let feed = args.follow.then(|| engine.alerts().subscribe());
    shutdown.run_until_shutdown(|| match &feed {
        Some(feed) => {
            if let Some(message) = feed.recv_timeout(SHUTDOWN_POLL) {
                println!("{message}\n");
            }
        }
        None => thread::sleep(SHUTDOWN_POLL),
    });

    session.stop();
    Ok(ExitCode::Interrupted)
}

fn run_register(config: &Config, args: &RegisterArgs) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    let hasher = Hasher::new(config.hash_algorithm);

    let sweep_root = if args.no_sweep {
        None
    } else {
        Some(args.sweep_root.clone().unwrap_or_else(|| config.watch_root.clone()))
    };
    let mut excluded = config.ignore_paths.clone();
    excluded.extend(config.self_paths());
    let options = RegisterOptions {
        sweep_root,
        excluded,
        delete_mode: config.delete_mode,
    };

    let report = register_file(&registry, &hasher, &args.file, &args.dir, &options)
        .with_context(|| format!("failed to register {}", args.file.display()))?;

    println!(
        "Registered {} (id {}) -> {}",
        report.record.filename,
        report.record.id,
        report.record.expected_path().display()
    );
    for path in &report.swept {
        println!("  removed existing copy: {}", path.display());
    }
    if report.sweep_errors > 0 {
        eprintln!(
            "Warning: {} file(s) could not be checked during the sweep",
            report.sweep_errors
        );
    }
    Ok(ExitCode::Success)
}

fn run_list(config: &Config, args: &ListArgs) -> Result<ExitCode> {
    let records = open_registry(config)?
        .list()
        .context("failed to read registry")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(ExitCode::Success);
    }
    if records.is_empty() {
        println!("No files registered");
        return Ok(ExitCode::Success);
    }

    println!(
        "{:>5}  {:<19}  {:<16}  {:<30}  ALLOWED DIRECTORY",
        "ID", "REGISTERED", "HASH", "FILENAME"
    );
    for record in &records {
        println!(
            "{:>5}  {:<19}  {:<16}  {:<30}  {}",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            short_hash(&record.hash_value),
            record.filename,
            record.allowed_directory.display()
        );
    }
    Ok(ExitCode::Success)
}

fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn run_unregister(config: &Config, id: i64) -> Result<ExitCode> {
    let registry = open_registry(config)?;
    if registry.delete(id).context("failed to update registry")? {
        println!("Unregistered record {id}");
        Ok(ExitCode::Success)
    } else {
        eprintln!("[{}] No registered file with id {id}", ExitCode::NotFound.code_prefix());
        Ok(ExitCode::NotFound)
    }
}

fn run_alerts_list(config: &Config, args: &ListArgs) -> Result<ExitCode> {
    let alerts = open_alerts(config)?;
    let blocks = alerts.list().context("failed to read alert log")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else if blocks.is_empty() {
        println!("No alerts in {}", alerts.log_path().display());
    } else {
        println!("{}", blocks.join("\n\n"));
    }
    Ok(ExitCode::Success)
}
