//! Platform runtime abstraction
//!
//! Every filesystem access made by the graph goes through the [`Runtime`]
//! trait. The file tree, crawler and fact cache never call `std::fs`
//! directly, which keeps them testable against [`test_utils::TestRuntime`]
//! and lets embedders supply their own I/O layer.

pub mod native;

// Test utilities (available in test builds)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use native::NativeRuntime;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// File metadata
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Whether this is a file
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

/// Partial read produced by [`Runtime::read_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRead {
    /// Content read so far (lossy UTF-8).
    pub content: String,
    /// `true` when the whole file was consumed.
    pub complete: bool,
}

/// Predicate over the content read so far; returning `false` stops the read.
pub type ReadPredicate = Box<dyn FnMut(&str) -> bool + Send>;

/// Chunk size used by streaming reads.
pub const READ_CHUNK_SIZE: usize = 512;

/// Platform runtime trait
///
/// # Example
///
/// ```rust,ignore
/// use haste_graph::runtime::{Runtime, RuntimeResult};
/// use async_trait::async_trait;
///
/// struct MyRuntime;
///
/// #[async_trait]
/// impl Runtime for MyRuntime {
///     async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
///         // Platform-specific implementation
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file from the filesystem
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Read a file in chunks while `predicate` keeps returning `true`.
    ///
    /// Used to pull the leading doc comment out of a source file without
    /// reading the rest of it.
    async fn read_until(&self, path: &Path, predicate: ReadPredicate)
    -> RuntimeResult<PartialRead>;

    /// Write a file to the filesystem
    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    /// Get file metadata
    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is an existing directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory
    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Remove a file
    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Rename a file, replacing the destination
    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    /// Read a directory (entry names only)
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;

    /// Get the current working directory
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
