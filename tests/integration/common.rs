//! Shared fixture: a scratch tree with a registry, cache, alert log and
//! engine wired together the way `dlpwatch watch` wires them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dlpwatch::actions::DeleteMode;
use dlpwatch::alerts::AlertDispatcher;
use dlpwatch::engine::Engine;
use dlpwatch::registry::{RecordSource, Registry, RegistryCache};
use dlpwatch::scanner::{HashAlgorithm, Hasher};
use tempfile::TempDir;

pub struct TestEnv {
    _dir: TempDir,
    pub root: PathBuf,
    pub registry: Arc<Registry>,
    pub cache: Arc<RegistryCache>,
    pub alerts: Arc<AlertDispatcher>,
    pub engine: Arc<Engine>,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        // Canonical root so paths match what the OS reports back.
        let root = dir.path().canonicalize().unwrap();
        let registry = Arc::new(Registry::open(&root.join("state/registry.db")).unwrap());
        let cache = Arc::new(RegistryCache::new(
            registry.clone() as Arc<dyn RecordSource>
        ));
        let alerts =
            Arc::new(AlertDispatcher::new(&root.join("state/logs/alerts_log.txt")).unwrap());
        let engine = Arc::new(Engine::new(
            Arc::clone(&cache),
            hasher(),
            DeleteMode::Permanent,
            Arc::clone(&alerts),
        ));
        Self {
            _dir: dir,
            root,
            registry,
            cache,
            alerts,
            engine,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn write(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Register `content` as `filename` in `allowed` and refresh the cache.
    pub fn protect(&self, allowed: &Path, filename: &str, content: &[u8]) -> String {
        let hash = hasher().hash_bytes(content);
        self.registry
            .upsert(filename, &hash, HashAlgorithm::Blake3.name(), allowed)
            .unwrap();
        self.cache.refresh().unwrap();
        hash
    }
}

pub fn hasher() -> Hasher {
    Hasher::new(HashAlgorithm::Blake3)
}
