//! Per-path cache of derived facts.
//!
//! Anything computed from a file's contents (its doc-block id, whether it is
//! a global module, its extracted dependencies) is stored here under the
//! file's path and a fact key. Concurrent requests for the same fact share a
//! single computation; a change event drops every fact for the path.
//!
//! Every entry remembers the file's mtime from before its first fact was
//! computed. Snapshots carry that mtime, and restored entries are
//! revalidated against the runtime on first access.

mod snapshot;

pub use snapshot::{FORMAT_VERSION, snapshot_path};

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::error::{GraphError, Result};
use crate::module::ModuleData;
use crate::runtime::Runtime;

/// Errors raised while loading or persisting the cache snapshot.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("cache corrupted: {0}")]
    Corrupted(String),
}

/// A cached fact value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FactValue {
    Flag(bool),
    Name(Option<String>),
    Data(Arc<ModuleData>),
}

/// Types that can be stored as a [`FactValue`].
pub trait Fact: Sized {
    fn into_value(self) -> FactValue;
    fn from_value(value: &FactValue) -> Option<Self>;
}

impl Fact for bool {
    fn into_value(self) -> FactValue {
        FactValue::Flag(self)
    }

    fn from_value(value: &FactValue) -> Option<Self> {
        match value {
            FactValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Fact for Option<String> {
    fn into_value(self) -> FactValue {
        FactValue::Name(self)
    }

    fn from_value(value: &FactValue) -> Option<Self> {
        match value {
            FactValue::Name(name) => Some(name.clone()),
            _ => None,
        }
    }
}

impl Fact for Arc<ModuleData> {
    fn into_value(self) -> FactValue {
        FactValue::Data(self)
    }

    fn from_value(value: &FactValue) -> Option<Self> {
        match value {
            FactValue::Data(data) => Some(data.clone()),
            _ => None,
        }
    }
}

type FactCell = Arc<OnceCell<FactValue>>;

#[derive(Debug, Default)]
struct PathFacts {
    cells: Mutex<FxHashMap<String, FactCell>>,
    /// mtime recorded in the snapshot this entry was restored from.
    restored_mtime: Option<u64>,
    /// mtime of the file the cached facts were derived from.
    source_mtime: Mutex<Option<u64>>,
    verified: OnceCell<()>,
}

impl PathFacts {
    fn restored(mtime: Option<u64>, facts: Vec<(String, FactValue)>) -> Self {
        let cells = facts
            .into_iter()
            .map(|(key, value)| (key, Arc::new(OnceCell::new_with(Some(value)))))
            .collect();
        Self {
            cells: Mutex::new(cells),
            restored_mtime: Some(mtime.unwrap_or_default()),
            source_mtime: Mutex::new(mtime),
            verified: OnceCell::new(),
        }
    }

    fn cell(&self, key: &str) -> FactCell {
        self.cells.lock().entry(key.to_string()).or_default().clone()
    }

    fn reset(&self, key: &str) -> FactCell {
        let cell = FactCell::default();
        self.cells.lock().insert(key.to_string(), cell.clone());
        cell
    }

    fn settled(&self) -> Vec<(String, FactValue)> {
        let mut facts: Vec<_> = self
            .cells
            .lock()
            .iter()
            .filter_map(|(key, cell)| cell.get().map(|v| (key.clone(), v.clone())))
            .collect();
        facts.sort_by(|a, b| a.0.cmp(&b.0));
        facts
    }
}

/// Derived-fact cache keyed by file path.
#[derive(Debug)]
pub struct FactCache {
    runtime: Arc<dyn Runtime>,
    entries: DashMap<PathBuf, Arc<PathFacts>>,
}

impl FactCache {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            entries: DashMap::new(),
        }
    }

    /// Return the fact `key` for `path`, computing it with `compute` when it
    /// is not cached. Concurrent callers share one computation. A failed
    /// computation is not cached.
    pub async fn get<T, F, Fut>(&self, path: &Path, key: &str, compute: F) -> Result<T>
    where
        T: Fact,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let facts = self.facts_for(path).await;
        let mut cell = facts.cell(key);

        if let Some(value) = cell.get() {
            if let Some(fact) = T::from_value(value) {
                return Ok(fact);
            }
            tracing::warn!(path = %path.display(), key, "cached fact has unexpected type, recomputing");
            cell = facts.reset(key);
        }

        if !cell.initialized() && facts.source_mtime.lock().is_none() {
            // Recorded before computing, never newer than the content read
            if let Some(mtime) = self.modified(path).await {
                facts.source_mtime.lock().get_or_insert(mtime);
            }
        }

        let value = cell
            .get_or_try_init(|| async { compute().await.map(Fact::into_value) })
            .await?;

        T::from_value(value).ok_or_else(|| {
            GraphError::Internal(format!(
                "fact '{}' for {} has conflicting types",
                key,
                path.display()
            ))
        })
    }

    async fn facts_for(&self, path: &Path) -> Arc<PathFacts> {
        let facts = self.entries.entry(path.to_path_buf()).or_default().clone();

        if let Some(restored) = facts.restored_mtime {
            facts
                .verified
                .get_or_init(|| async {
                    let current = self.modified(path).await.unwrap_or_default();
                    if current != restored {
                        tracing::debug!(path = %path.display(), "snapshot entry is stale");
                        facts.cells.lock().clear();
                        *facts.source_mtime.lock() = None;
                    }
                })
                .await;
        }

        facts
    }

    async fn modified(&self, path: &Path) -> Option<u64> {
        self.runtime.metadata(path).await.ok().and_then(|m| m.modified)
    }

    /// Drop every fact for `path`.
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of paths with at least one entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore entries from the snapshot for `epoch` under `dir`.
    ///
    /// A missing snapshot is a cold start. A corrupt or incompatible one is
    /// logged, removed, and treated as empty. Returns the number of restored
    /// paths.
    pub async fn load_snapshot(&self, dir: &Path, epoch: &str) -> usize {
        let file = snapshot_path(dir, epoch);
        if !self.runtime.exists(&file) {
            return 0;
        }

        match snapshot::read(self.runtime.as_ref(), &file, epoch).await {
            Ok(entries) => {
                let count = entries.len();
                for entry in entries {
                    self.entries.insert(
                        entry.path,
                        Arc::new(PathFacts::restored(entry.mtime, entry.facts)),
                    );
                }
                tracing::debug!(path = %file.display(), entries = count, "loaded cache snapshot");
                count
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "discarding unusable cache snapshot");
                if let Err(e) = self.runtime.remove_file(&file).await {
                    tracing::warn!(error = %e, "failed to remove cache snapshot");
                }
                0
            }
        }
    }

    /// Write every settled fact to the snapshot for `epoch` under `dir`.
    pub async fn persist(&self, dir: &Path, epoch: &str) -> Result<PathBuf> {
        let pending: Vec<(PathBuf, Arc<PathFacts>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut entries = Vec::with_capacity(pending.len());
        for (path, facts) in pending {
            let Some(mtime) = *facts.source_mtime.lock() else {
                continue;
            };
            let settled = facts.settled();
            if settled.is_empty() {
                continue;
            }
            if self.modified(&path).await != Some(mtime) {
                tracing::debug!(path = %path.display(), "file changed since its facts were computed, not persisting");
                continue;
            }
            entries.push(snapshot::Entry {
                path,
                mtime: Some(mtime),
                facts: settled,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let file = snapshot::write(self.runtime.as_ref(), dir, epoch, entries).await?;
        Ok(file)
    }
}
