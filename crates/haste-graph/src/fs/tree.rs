//! In-memory mirror of the project roots.
//!
//! The tree answers existence, type and read queries without going back to
//! disk for every lookup. Nodes are keyed by absolute path; a directory keeps
//! the names of its children, a file keeps a lazily filled content cell that
//! concurrent readers share.
//!
//! ```text
//! roots (declaration order)
//!   /proj          Watched   crawled up front, patched by watcher events
//!   /shared/lib    Detached  nodes created on first access after a disk check
//! ```

use path_clean::PathClean;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use parking_lot::RwLock;

use crate::error::{GraphError, Result};
use crate::helpers::PACKAGE_JSON;
use crate::runtime::{PartialRead, ReadPredicate, Runtime};
use crate::watch::ChangeKind;

/// Predicate deciding whether a path is excluded from the tree.
pub type IgnorePredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// Crawled and kept live by the file watcher.
    Watched,
    /// Materialized lazily, never watched.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub path: PathBuf,
    pub kind: RootKind,
}

impl Root {
    pub fn watched(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::Watched,
        }
    }

    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::Detached,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

type ContentCell = Arc<OnceCell<Arc<[u8]>>>;

#[derive(Debug)]
struct FileNode {
    kind: EntryKind,
    children: BTreeSet<String>,
    content: ContentCell,
}

impl FileNode {
    fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            children: BTreeSet::new(),
            content: ContentCell::default(),
        }
    }
}

/// The virtual file tree.
pub struct FileTree {
    runtime: Arc<dyn Runtime>,
    roots: Vec<Root>,
    ignore: IgnorePredicate,
    nodes: RwLock<FxHashMap<PathBuf, FileNode>>,
}

impl std::fmt::Debug for FileTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTree")
            .field("roots", &self.roots)
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

impl FileTree {
    pub fn new(runtime: Arc<dyn Runtime>, roots: Vec<Root>, ignore: IgnorePredicate) -> Self {
        let mut nodes = FxHashMap::default();
        for root in &roots {
            nodes.insert(root.path.clone(), FileNode::new(EntryKind::Directory));
        }

        Self {
            runtime,
            roots,
            ignore,
            nodes: RwLock::new(nodes),
        }
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    /// Paths of the watched roots, in declaration order.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|r| r.kind == RootKind::Watched)
            .map(|r| r.path.clone())
            .collect()
    }

    /// Seed the tree with crawl results. Returns the number of files added.
    pub fn build(&self, files: impl IntoIterator<Item = PathBuf>) -> usize {
        let mut nodes = self.nodes.write();
        let mut added = 0;

        for file in files {
            let Some(root) = self.root_for(&file) else {
                tracing::debug!(path = %file.display(), "crawled file outside roots");
                continue;
            };
            if (self.ignore)(&file) {
                continue;
            }
            insert_path(&mut nodes, &root.path, &file, EntryKind::File);
            added += 1;
        }

        added
    }

    /// First root (in declaration order) containing `path`.
    pub fn root_for(&self, path: &Path) -> Option<&Root> {
        self.roots.iter().find(|root| path.starts_with(&root.path))
    }

    /// Type of the entry at `path`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotFoundInRoots`] when no root contains the path and
    /// [`GraphError::FileNotFound`] when a root contains it but it does not exist.
    pub fn entry_kind(&self, path: &Path) -> Result<EntryKind> {
        let path = path.clean();
        if let Some(node) = self.nodes.read().get(&path) {
            return Ok(node.kind);
        }

        match self.root_for(&path) {
            None => Err(GraphError::NotFoundInRoots(path)),
            Some(root) if root.kind == RootKind::Detached => self.materialize(&root.path, &path),
            Some(_) => Err(GraphError::FileNotFound(path)),
        }
    }

    /// Create nodes for a path inside a detached root after checking the disk.
    fn materialize(&self, root: &Path, path: &Path) -> Result<EntryKind> {
        if !self.runtime.exists(path) {
            return Err(GraphError::FileNotFound(path.to_path_buf()));
        }

        let kind = if self.runtime.is_dir(path) {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let mut nodes = self.nodes.write();
        insert_path(&mut nodes, root, path, kind);

        if kind == EntryKind::Directory {
            let manifest = path.join(PACKAGE_JSON);
            if self.runtime.exists(&manifest) {
                insert_path(&mut nodes, root, &manifest, EntryKind::File);
            }
        }

        Ok(kind)
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.entry_kind(path).is_ok()
    }

    pub fn file_exists(&self, path: &Path) -> bool {
        matches!(self.entry_kind(path), Ok(EntryKind::File))
    }

    pub fn dir_exists(&self, path: &Path) -> bool {
        matches!(self.entry_kind(path), Ok(EntryKind::Directory))
    }

    fn content_cell(&self, path: &Path) -> Result<ContentCell> {
        if self.entry_kind(path)? == EntryKind::Directory {
            return Err(GraphError::Io(format!(
                "cannot read directory {}",
                path.display()
            )));
        }
        self.nodes
            .read()
            .get(path)
            .map(|node| node.content.clone())
            .ok_or_else(|| GraphError::FileNotFound(path.to_path_buf()))
    }

    /// Read a file, caching the bytes until the next change event.
    pub async fn read_file(&self, path: &Path) -> Result<Arc<[u8]>> {
        let path = path.clean();
        let cell = self.content_cell(&path)?;
        let bytes = cell
            .get_or_try_init(|| async {
                let bytes = self.runtime.read_file(&path).await?;
                Ok::<_, GraphError>(Arc::from(bytes))
            })
            .await?;
        Ok(bytes.clone())
    }

    pub async fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_file(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the start of a file while `predicate` holds.
    ///
    /// Served from the content cache when the file was already read; a
    /// partial read that reached end of file fills the cache.
    pub async fn read_until(&self, path: &Path, predicate: ReadPredicate) -> Result<PartialRead> {
        let path = path.clean();
        let cell = self.content_cell(&path)?;
        if let Some(bytes) = cell.get() {
            return Ok(PartialRead {
                content: String::from_utf8_lossy(bytes).into_owned(),
                complete: true,
            });
        }

        let partial = self.runtime.read_until(&path, predicate).await?;
        if partial.complete {
            let _ = cell.set(Arc::from(partial.content.as_bytes()));
        }
        Ok(partial)
    }

    /// Nearest file called `name` in `path`'s directory or one of its
    /// ancestors, without leaving the containing root.
    pub fn closest(&self, path: &Path, name: &str) -> Option<PathBuf> {
        let root = self.root_for(path)?;
        let mut dir = path.parent();

        while let Some(current) = dir {
            if !current.starts_with(&root.path) {
                break;
            }
            let candidate = current.join(name);
            if self.file_exists(&candidate) {
                return Some(candidate);
            }
            if current == root.path {
                break;
            }
            dir = current.parent();
        }

        None
    }

    /// Sorted absolute paths of a directory's children.
    pub fn children(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let dir = dir.clean();
        self.entry_kind(&dir)?;
        let nodes = self.nodes.read();
        Ok(nodes
            .get(&dir)
            .map(|node| node.children.iter().map(|name| dir.join(name)).collect())
            .unwrap_or_default())
    }

    /// Children of `dir` whose full path matches `pattern`.
    pub fn matches(&self, dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
        Ok(self
            .children(dir)?
            .into_iter()
            .filter(|p| pattern.is_match(&p.to_string_lossy()))
            .collect())
    }

    /// Every file currently in the tree, sorted.
    pub fn all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .nodes
            .read()
            .iter()
            .filter(|(_, node)| node.kind == EntryKind::File)
            .map(|(path, _)| path.clone())
            .collect();
        files.sort();
        files
    }

    /// Every file whose full path matches `pattern`, sorted.
    pub fn files_matching(&self, pattern: &Regex) -> Vec<PathBuf> {
        self.all_files()
            .into_iter()
            .filter(|p| pattern.is_match(&p.to_string_lossy()))
            .collect()
    }

    pub fn find_files_by_exts(&self, extensions: &[String]) -> Vec<PathBuf> {
        self.all_files()
            .into_iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| extensions.iter().any(|e| e == ext))
            })
            .collect()
    }

    /// Patch the tree for one watcher event. Returns `false` when the event
    /// was skipped (outside the roots, ignored, or a directory being added).
    pub fn apply_change(&self, kind: ChangeKind, path: &Path) -> bool {
        let path = path.clean();
        let Some(root) = self.root_for(&path) else {
            return false;
        };
        if (self.ignore)(&path) || path == root.path {
            return false;
        }

        let mut nodes = self.nodes.write();
        match kind {
            ChangeKind::Delete => remove_path(&mut nodes, &path),
            ChangeKind::Add | ChangeKind::Change => {
                if self.runtime.is_dir(&path) {
                    return false;
                }
                match nodes.get_mut(&path) {
                    // Fresh cell: readers holding the old one finish with old bytes
                    Some(node) => node.content = ContentCell::default(),
                    None => insert_path(&mut nodes, &root.path, &path, EntryKind::File),
                }
            }
        }

        true
    }
}

/// Insert `path` and any missing ancestors up to `root`.
fn insert_path(
    nodes: &mut FxHashMap<PathBuf, FileNode>,
    root: &Path,
    path: &Path,
    kind: EntryKind,
) {
    nodes
        .entry(path.to_path_buf())
        .or_insert_with(|| FileNode::new(kind));

    let mut child = path.to_path_buf();
    while child != root {
        let (Some(parent), Some(name)) = (child.parent(), child.file_name()) else {
            break;
        };
        let parent = parent.to_path_buf();
        let node = nodes
            .entry(parent.clone())
            .or_insert_with(|| FileNode::new(EntryKind::Directory));
        let inserted = node.children.insert(name.to_string_lossy().into_owned());
        if !inserted {
            break;
        }
        child = parent;
    }
}

/// Remove `path` and everything below it, detaching it from its parent.
fn remove_path(nodes: &mut FxHashMap<PathBuf, FileNode>, path: &Path) {
    let Some(node) = nodes.remove(path) else {
        return;
    };

    for child in node.children {
        remove_path(nodes, &path.join(child));
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Some(parent) = nodes.get_mut(parent) {
            parent.children.remove(name.to_string_lossy().as_ref());
        }
    }
}
