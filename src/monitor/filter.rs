//! Event filtering.
//!
//! Decides which filesystem events are worth evaluating:
//! - only create, data-modify and rename-destination events
//! - never anything under an ignored subtree (the tool's own log and
//!   database directories are always ignored to avoid feedback loops)
//! - never anything matching a gitignore-style pattern
//! - only files whose extension is on the allow-list

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Event;

use crate::scanner::path_utils::{extension_of, is_within, normalize_pathbuf};

/// Path filter applied before any hashing happens.
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    ignored_dirs: Vec<PathBuf>,
    patterns: Option<Gitignore>,
    extensions: HashSet<String>,
}

impl EventFilter {
    /// Create a filter for events under `root` accepting `extensions`
    /// (with or without a leading dot, any case).
    #[must_use]
    pub fn new<I, S>(root: &Path, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: normalize_pathbuf(root),
            ignored_dirs: Vec::new(),
            patterns: None,
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Add subtrees whose events are dropped.
    #[must_use]
    pub fn with_ignored_dirs<I: IntoIterator<Item = PathBuf>>(mut self, dirs: I) -> Self {
        self.ignored_dirs.extend(dirs);
        self
    }

    /// Add gitignore-style patterns, matched relative to the root.
    #[must_use]
    pub fn with_patterns(mut self, patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return self;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }
        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => self.patterns = Some(gitignore),
            Ok(_) => {}
            Err(e) => log::warn!("Failed to build ignore patterns: {}", e),
        }
        self
    }

    /// Whether `path` lies under an ignored subtree or matches a pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.ignored_dirs.iter().any(|dir| is_within(path, dir)) {
            return true;
        }

        let Some(gitignore) = &self.patterns else {
            return false;
        };
        match normalize_pathbuf(path).strip_prefix(&self.root) {
            Ok(relative) => gitignore
                .matched_path_or_any_parents(relative, false)
                .is_ignore(),
            Err(_) => false,
        }
    }

    /// Whether the extension of `path` is on the allow-list.
    #[must_use]
    pub fn has_allowed_extension(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Full check: not ignored and extension allowed.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        !self.is_ignored(path) && self.has_allowed_extension(path)
    }
}

/// The path an event is about, if the event kind is one we evaluate.
///
/// Renames report their destination. Removals, access events, metadata
/// changes and rename sources are dropped.
#[must_use]
pub fn event_target(event: &Event) -> Option<PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths.first().cloned(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => event.paths.last().cloned(),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => event.paths.first().cloned(),
        _ => None,
    }
}
