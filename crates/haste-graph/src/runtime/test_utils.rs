//! Test utilities for haste-graph.
//!
//! `TestRuntime` wraps `std::fs` synchronously and counts reads so tests can
//! assert that the file tree serves repeated reads from its cache.

// Test utilities are allowed to use std::fs since they only run on native platforms
#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{FileMetadata, PartialRead, ReadPredicate, Runtime, RuntimeError, RuntimeResult};

fn map_io(path: &Path, e: std::io::Error) -> RuntimeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(e.to_string())
    }
}

/// Simple test runtime that wraps std::fs for native tests.
///
/// ```rust,ignore
/// use tempfile::TempDir;
/// use haste_graph::runtime::test_utils::TestRuntime;
///
/// let temp = TempDir::new().unwrap();
/// let runtime = TestRuntime::new(temp.path().to_path_buf());
/// assert_eq!(runtime.read_count(), 0);
/// ```
#[derive(Debug)]
pub struct TestRuntime {
    cwd: PathBuf,
    reads: AtomicUsize,
}

impl TestRuntime {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read_file` and `read_until` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Runtime for TestRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::fs::read(path).map_err(|e| map_io(path, e))
    }

    async fn read_until(
        &self,
        path: &Path,
        mut predicate: ReadPredicate,
    ) -> RuntimeResult<PartialRead> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let bytes = std::fs::read(path).map_err(|e| map_io(path, e))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        // Feed line by line; good enough to exercise early termination
        let mut end = 0;
        for line in content.split_inclusive('\n') {
            end += line.len();
            if !predicate(&content[..end]) {
                return Ok(PartialRead {
                    content: content[..end].to_string(),
                    complete: end == content.len(),
                });
            }
        }

        Ok(PartialRead {
            content,
            complete: true,
        })
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        std::fs::write(path, content).map_err(|e| map_io(path, e))
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let metadata = std::fs::metadata(path).map_err(|e| map_io(path, e))?;
        Ok(FileMetadata {
            size: metadata.len(),
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
            modified: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        if recursive {
            std::fs::create_dir_all(path).map_err(|e| map_io(path, e))
        } else {
            std::fs::create_dir(path).map_err(|e| map_io(path, e))
        }
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        std::fs::remove_file(path).map_err(|e| map_io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        std::fs::rename(from, to).map_err(|e| map_io(from, e))
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let entries: Vec<String> = std::fs::read_dir(path)
            .map_err(|e| map_io(path, e))?
            .filter_map(|entry| {
                entry
                    .ok()
                    .and_then(|e| e.file_name().to_str().map(String::from))
            })
            .collect();
        Ok(entries)
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_runtime_counts_reads() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path().to_path_buf();
        let runtime = TestRuntime::new(cwd.clone());

        let file_path = cwd.join("test.txt");
        runtime.write_file(&file_path, b"hello world").await.unwrap();

        let content = runtime.read_file(&file_path).await.unwrap();
        assert_eq!(content, b"hello world");
        assert_eq!(runtime.read_count(), 1);
    }

    #[tokio::test]
    async fn test_runtime_read_until_by_line() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path().to_path_buf();
        let runtime = TestRuntime::new(cwd.clone());

        let file_path = cwd.join("a.js");
        fs::write(&file_path, "line1\nline2\nline3\n").unwrap();

        let partial = runtime
            .read_until(&file_path, Box::new(|s: &str| !s.contains("line2")))
            .await
            .unwrap();
        assert_eq!(partial.content, "line1\nline2\n");
        assert!(!partial.complete);
    }

    #[tokio::test]
    async fn test_runtime_missing_file() {
        let temp = TempDir::new().unwrap();
        let runtime = TestRuntime::new(temp.path().to_path_buf());
        let err = runtime
            .metadata(&temp.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
    }
}
