//! `notify`-backed watcher for native platforms.
//!
//! Watches every root recursively and maps notify events onto
//! [`ChangeKind`], dropping ignored paths. Events are debounced per path on
//! the trailing edge: a burst of events for one file is delivered as its
//! last event once the file has been quiet for the configured window.

use indexmap::IndexMap;
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use haste_config::WatchConfig;

use super::{ChangeKind, FileStat, FileWatcher, Subscribers, WatchEvent};
use crate::error::{GraphError, Result};
use crate::helpers::{PACKAGE_JSON, in_node_modules};

/// Suffixes written by editors while saving.
const TEMP_FILE_SUFFIXES: &[&str] = &["~", ".swp", ".swx", ".tmp"];

/// Filesystem watcher over one or more roots.
pub struct NotifyWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
    subscribers: Subscribers,
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("roots", &self.roots)
            .finish()
    }
}

impl NotifyWatcher {
    /// Start watching `roots` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Watcher`] if a root does not exist or the OS
    /// watcher cannot be created.
    pub fn new(roots: Vec<PathBuf>, config: &WatchConfig) -> Result<Self> {
        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(GraphError::Watcher(format!(
                "watch root does not exist: {}",
                missing.display()
            )));
        }

        let subscribers = Subscribers::default();
        let publisher = subscribers.clone();
        let debounce = Duration::from_millis(config.debounce_ms);
        let ignore_patterns = config.ignore.clone();
        let watched_roots = roots.clone();

        let (raw_tx, raw_rx) = std_mpsc::channel::<WatchEvent>();
        thread::Builder::new()
            .name("haste-watch-debounce".to_string())
            .spawn(move || Debouncer::new(debounce).run(raw_rx, |event| publisher.publish(event)))
            .map_err(|e| GraphError::Watcher(e.to_string()))?;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    return;
                }
            };

            for path in &event.paths {
                let Some(root) = watched_roots.iter().find(|root| path.starts_with(root)) else {
                    continue;
                };
                if should_ignore(path, root, &ignore_patterns) {
                    continue;
                }
                let Some(kind) = change_kind(&event.kind, path) else {
                    continue;
                };

                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                tracing::trace!(%kind, path = %path.display(), "raw file change");

                let _ = raw_tx.send(WatchEvent {
                    kind,
                    relative_path: relative.to_path_buf(),
                    root: root.clone(),
                    stat: (kind != ChangeKind::Delete).then(|| FileStat {
                        is_dir: path.is_dir(),
                        modified: None,
                    }),
                });
            }
        })
        .map_err(|e| GraphError::Watcher(e.to_string()))?;

        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| GraphError::Watcher(e.to_string()))?;
        }

        tracing::info!(roots = roots.len(), "watching for file changes");

        Ok(Self {
            _watcher: watcher,
            roots,
            subscribers,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl FileWatcher for NotifyWatcher {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WatchEvent> {
        self.subscribers.subscribe()
    }
}

/// Per-path trailing-edge debouncer.
///
/// Holds the latest event for each path until the path has been quiet for
/// `window`. Paths are released in the order their quiet period ends.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    pending: IndexMap<PathBuf, (WatchEvent, Instant)>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: IndexMap::new(),
        }
    }

    /// Record `event`, replacing (and re-queueing) an earlier one for the
    /// same path. A pending add stays an add when the file is then written.
    fn push(&mut self, mut event: WatchEvent, now: Instant) {
        let path = event.absolute_path();
        if let Some((previous, _)) = self.pending.shift_remove(&path) {
            if previous.kind == ChangeKind::Add && event.kind == ChangeKind::Change {
                event.kind = ChangeKind::Add;
            }
        }
        self.pending.insert(path, (event, now + self.window));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    /// Events whose quiet period has ended by `now`.
    fn drain_ready(&mut self, now: Instant) -> Vec<WatchEvent> {
        let mut ready = Vec::new();
        self.pending.retain(|_, (event, deadline)| {
            if *deadline <= now {
                ready.push(event.clone());
                false
            } else {
                true
            }
        });
        ready
    }

    /// Forward debounced events until every sender is gone, then flush.
    fn run(mut self, events: std_mpsc::Receiver<WatchEvent>, mut deliver: impl FnMut(WatchEvent)) {
        loop {
            let received = match self.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    events.recv_timeout(wait)
                }
                None => events
                    .recv()
                    .map_err(|_| std_mpsc::RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => self.push(event, Instant::now()),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
            for event in self.drain_ready(Instant::now()) {
                tracing::debug!(kind = %event.kind, path = %event.relative_path.display(), "file change");
                deliver(event);
            }
        }

        for (_, (event, _)) in self.pending.drain(..) {
            deliver(event);
        }
    }
}

fn change_kind(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Add),
        // Renames arrive as one event per side; existence tells them apart
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
            ChangeKind::Add
        } else {
            ChangeKind::Delete
        }),
        EventKind::Modify(_) => Some(ChangeKind::Change),
        EventKind::Remove(_) => Some(ChangeKind::Delete),
        _ => None,
    }
}

/// Check if a path should be ignored.
fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };

    let file_name = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if TEMP_FILE_SUFFIXES.iter().any(|s| file_name.ends_with(s)) {
        return true;
    }
    // Under node_modules only manifests are reported
    if in_node_modules(rel_path) && file_name != PACKAGE_JSON {
        return true;
    }

    for component in rel_path.components() {
        let Some(name) = component.as_os_str().to_str() else {
            continue;
        };
        // Hidden files and directories
        if name.starts_with('.') && name != "." && name != ".." {
            return true;
        }
        if ignore_patterns.iter().any(|p| p == name) {
            return true;
        }
    }

    false
}
