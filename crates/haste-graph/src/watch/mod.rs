//! File watcher boundary.
//!
//! Watchers publish [`WatchEvent`]s to every subscriber over an unbounded
//! channel. The graph folds them into its serialized apply loop, so the order
//! events arrive in is the order they are applied in.
//!
//! ```text
//!  notify / daemon / tests
//!          │ WatchEvent
//!          ▼
//!   ┌──────────────┐  mpsc   ┌───────────────────────┐
//!   │ FileWatcher  │────────▶│ DependencyGraph apply │
//!   └──────────────┘         │ loop (one at a time)  │
//!          │ query           └───────────────────────┘
//!          ▼
//!   ┌──────────────┐
//!   │ QueryClient  │──▶ crawler fast path
//!   └──────────────┘
//! ```

mod notify_watcher;

pub use notify_watcher::NotifyWatcher;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Change,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Stat information a watcher may attach to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub modified: Option<u64>,
}

/// One change reported by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    /// Path relative to `root`.
    pub relative_path: PathBuf,
    pub root: PathBuf,
    pub stat: Option<FileStat>,
}

impl WatchEvent {
    pub fn new(kind: ChangeKind, root: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            relative_path: relative_path.into(),
            root: root.into(),
            stat: None,
        }
    }

    pub fn absolute_path(&self) -> PathBuf {
        self.root.join(&self.relative_path)
    }

    pub fn is_dir(&self) -> bool {
        self.stat.is_some_and(|s| s.is_dir)
    }
}

/// Query protocol of a file-watching daemon, used by the crawler when the
/// watcher can list files faster than a directory walk.
#[async_trait]
pub trait QueryClient: Send + Sync + fmt::Debug {
    /// Absolute paths of every file under `root` whose extension is one of
    /// `extensions`.
    async fn query_files(&self, root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>>;
}

/// A source of filesystem change events.
pub trait FileWatcher: Send + Sync + fmt::Debug {
    /// Register a new subscriber. Every subscriber sees every event.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WatchEvent>;

    /// Whether [`FileWatcher::query_client`] can answer crawl queries.
    fn supports_query(&self) -> bool {
        false
    }

    /// Query client responsible for `root`, if any.
    fn query_client(&self, _root: &Path) -> Option<Arc<dyn QueryClient>> {
        None
    }
}

/// Fan-out list of subscribers shared by the watcher implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Subscribers {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<WatchEvent>>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<WatchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, pruning closed ones.
    pub(crate) fn publish(&self, event: WatchEvent) {
        self.senders
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Watcher driven by explicit calls, for tests and embedders that receive
/// change notifications from elsewhere.
///
/// ```
/// use haste_graph::watch::{ChangeKind, FileWatcher, ManualWatcher};
///
/// let watcher = ManualWatcher::new();
/// let mut events = watcher.subscribe();
/// watcher.emit_change(ChangeKind::Change, "/proj", "index.js");
/// assert_eq!(events.try_recv().unwrap().kind, ChangeKind::Change);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManualWatcher {
    subscribers: Subscribers,
    query: Option<Arc<dyn QueryClient>>,
}

impl ManualWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watcher that also answers crawl queries through `client`.
    pub fn with_query_client(client: Arc<dyn QueryClient>) -> Self {
        Self {
            subscribers: Subscribers::default(),
            query: Some(client),
        }
    }

    pub fn emit(&self, event: WatchEvent) {
        self.subscribers.publish(event);
    }

    pub fn emit_change(
        &self,
        kind: ChangeKind,
        root: impl Into<PathBuf>,
        relative_path: impl Into<PathBuf>,
    ) {
        self.emit(WatchEvent::new(kind, root, relative_path));
    }
}

impl FileWatcher for ManualWatcher {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WatchEvent> {
        self.subscribers.subscribe()
    }

    fn supports_query(&self) -> bool {
        self.query.is_some()
    }

    fn query_client(&self, _root: &Path) -> Option<Arc<dyn QueryClient>> {
        self.query.clone()
    }
}
