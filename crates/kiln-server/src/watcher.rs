//! Glob-filtered file watching.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use globset::GlobMatcher;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use kiln_assets::{compile_glob, glob_base, AssetError};

/// What the browser should do once a rule's task has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Leave the page alone
    None,
    /// Refresh stylesheets in place
    Css,
    /// Reload the page
    Full,
}

/// A glob and the reaction to changes of files it matches.
#[derive(Debug, Clone)]
pub struct WatchRule {
    /// Glob relative to the watched root
    pub pattern: String,

    /// Task to run on change
    pub task: Option<String>,

    /// Browser reaction after the task
    pub reload: Reload,

    matcher: GlobMatcher,
}

impl WatchRule {
    /// Create a rule.
    pub fn new(pattern: &str, task: Option<&str>, reload: Reload) -> Result<Self, AssetError> {
        Ok(Self {
            pattern: pattern.to_string(),
            task: task.map(str::to_string),
            reload,
            matcher: compile_glob(pattern)?,
        })
    }

    /// Whether a root-relative path matches this rule.
    pub fn matches(&self, relative: &Path) -> bool {
        self.matcher.is_match(relative)
    }

    /// Directory to watch for this rule, and whether it must be watched
    /// recursively.
    fn watch_target(&self, root: &Path) -> (PathBuf, RecursiveMode) {
        let base = glob_base(&self.pattern);
        let rest = Path::new(self.pattern.trim_start_matches("./"))
            .strip_prefix(&base)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| self.pattern.clone());

        let mode = if rest.contains("**") || rest.contains('/') {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        (root.join(base), mode)
    }
}

/// A change that matched a watch rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Index of the matching rule
    pub rule: usize,

    /// Changed path, relative to the watched root
    pub path: PathBuf,
}

/// File watcher that only reports paths matching its rules.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the directories the rules' globs live in.
    ///
    /// Returns the watcher and a channel to receive events. Every matching
    /// change is forwarded; there is no debouncing.
    pub fn new(
        root: &Path,
        rules: &[WatchRule],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let root = root.canonicalize()?;
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        let mut targets: Vec<(PathBuf, RecursiveMode)> = Vec::new();
        for rule in rules {
            let (dir, mode) = existing_target(&root, rule.watch_target(&root));
            match targets.iter_mut().find(|(d, _)| *d == dir) {
                Some(existing) if mode == RecursiveMode::Recursive => existing.1 = mode,
                Some(_) => {}
                None => targets.push((dir, mode)),
            }
        }

        for (dir, mode) in &targets {
            tracing::debug!("Watching {}", dir.display());
            watcher.watch(dir, *mode).map_err(std::io::Error::other)?;
        }

        let rules = rules.to_vec();
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for watch_event in classify_event(&root, &rules, &event) {
                    if async_tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Replace a directory that does not exist yet with its nearest existing
/// ancestor under `root`, watched recursively so the directory is seen once
/// it is created.
fn existing_target(
    root: &Path,
    (dir, mode): (PathBuf, RecursiveMode),
) -> (PathBuf, RecursiveMode) {
    if dir.is_dir() {
        return (dir, mode);
    }

    let ancestor = dir
        .ancestors()
        .skip(1)
        .take_while(|a| a.starts_with(root))
        .find(|a| a.is_dir())
        .unwrap_or(root)
        .to_path_buf();
    tracing::debug!(
        "{} does not exist, watching {} instead",
        dir.display(),
        ancestor.display()
    );
    (ancestor, RecursiveMode::Recursive)
}

/// Match a notify event against the rules.
///
/// Each rule fires at most once per event, so a rename within a glob
/// triggers one run. Paths outside every glob produce nothing.
pub fn classify_event(root: &Path, rules: &[WatchRule], event: &notify::Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        _ => return Vec::new(),
    }

    let mut fired = BTreeSet::new();
    let mut events = Vec::new();

    for path in &event.paths {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if let Some(rule) = rules.iter().position(|r| r.matches(relative)) {
            if fired.insert(rule) {
                events.push(WatchEvent {
                    rule,
                    path: relative.to_path_buf(),
                });
            }
        }
    }

    events
}
