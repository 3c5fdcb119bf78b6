//! Initial discovery of the files under the watched roots.
//!
//! Two strategies: when the watcher exposes a query client the file list is
//! fetched from it; otherwise each root is walked breadth-first through the
//! [`Runtime`]. Both return the same sorted, de-duplicated list.

use futures::future::join_all;
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::tree::IgnorePredicate;
use crate::error::{GraphError, Result};
use crate::runtime::{Runtime, RuntimeError};
use crate::watch::FileWatcher;

/// What the crawler collects.
#[derive(Clone)]
pub struct CrawlOptions {
    /// Extensions (without dot) of the files to keep.
    pub extensions: Vec<String>,
    /// Paths to skip; an ignored directory is not descended into.
    pub ignore: IgnorePredicate,
}

impl std::fmt::Debug for CrawlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlOptions")
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl CrawlOptions {
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            ignore: Arc::new(|_: &Path| false),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnorePredicate) -> Self {
        self.ignore = ignore;
        self
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Collect every file under `roots` whose extension is in
/// `options.extensions`.
pub async fn crawl(
    roots: &[PathBuf],
    options: &CrawlOptions,
    runtime: &dyn Runtime,
    watcher: Option<&dyn FileWatcher>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for root in roots {
        let client = watcher
            .filter(|w| w.supports_query())
            .and_then(|w| w.query_client(root));

        let found = match client {
            Some(client) => {
                tracing::debug!(root = %root.display(), "crawling via watcher query");
                client
                    .query_files(root, &options.extensions)
                    .await?
                    .into_iter()
                    .map(|p| p.clean())
                    .filter(|p| options.wants(p) && !(options.ignore)(p))
                    .collect()
            }
            None => walk(root, options, runtime).await?,
        };

        tracing::debug!(root = %root.display(), files = found.len(), "crawled root");
        files.extend(found);
    }

    files.sort();
    files.dedup();
    Ok(files)
}

async fn walk(root: &Path, options: &CrawlOptions, runtime: &dyn Runtime) -> Result<Vec<PathBuf>> {
    if !runtime.is_dir(root) {
        return Err(GraphError::FileNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let names = match runtime.read_dir(&dir).await {
            Ok(names) => names,
            // Directory vanished between listing and reading
            Err(RuntimeError::FileNotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<PathBuf> = names
            .into_iter()
            .map(|name| dir.join(name))
            .filter(|path| !(options.ignore)(path))
            .collect();

        let stats = join_all(entries.iter().map(|path| runtime.metadata(path))).await;

        for (path, stat) in entries.into_iter().zip(stats) {
            match stat {
                Ok(meta) if meta.is_dir => pending.push(path),
                Ok(meta) if meta.is_file && options.wants(&path) => files.push(path),
                Ok(_) => {}
                // Broken symlink
                Err(RuntimeError::FileNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(files)
}
