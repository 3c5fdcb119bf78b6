//! Scenario tests over on-disk fixture trees.
//!
//! Each test lays out a small project in a temp dir, builds a
//! [`DependencyGraph`] over it with a [`TestRuntime`], and checks the
//! resolved graph.

#![allow(clippy::disallowed_methods)]

mod resolution_tests;
mod walker_tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::runtime::test_utils::TestRuntime;
use crate::watch::ManualWatcher;
use crate::{DependencyGraph, GraphConfig};

pub(crate) struct Fixture {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap().join("proj");
        std::fs::create_dir_all(&root).unwrap();
        Self { _temp: temp, root }
    }

    /// Fixture with `files` as `(relative path, contents)`.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let fixture = Self::new();
        for (path, contents) in files {
            fixture.write(path, contents);
        }
        fixture
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.path(relative)).unwrap();
    }

    /// Scratch directory next to the project root.
    pub fn outside(&self, name: &str) -> PathBuf {
        let dir = self.root.parent().unwrap().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn config(&self) -> GraphConfig {
        GraphConfig::new([self.root.clone()])
    }

    pub fn runtime(&self) -> Arc<TestRuntime> {
        Arc::new(TestRuntime::new(self.root.clone()))
    }

    pub fn graph(&self) -> DependencyGraph {
        self.graph_with(self.config())
    }

    pub fn graph_with(&self, config: GraphConfig) -> DependencyGraph {
        DependencyGraph::builder(config)
            .runtime(self.runtime())
            .build()
            .unwrap()
    }

    pub fn watched_graph(&self, config: GraphConfig) -> (DependencyGraph, Arc<ManualWatcher>) {
        let watcher = Arc::new(ManualWatcher::new());
        let graph = DependencyGraph::builder(config)
            .runtime(self.runtime())
            .watcher(watcher.clone())
            .build()
            .unwrap();
        (graph, watcher)
    }
}

/// Paths of `response`'s modules relative to `root`.
pub(crate) fn relative_paths(root: &Path, paths: Vec<&Path>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap_or(p)
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}
