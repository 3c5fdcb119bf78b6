//! Native Runtime Implementation
//!
//! ```text
//! ┌─────────────────┐
//! │ NativeRuntime   │
//! │  .read_file()   │────▶ std::fs::read()
//! │  .read_until()  │────▶ std::fs::File + Read (chunked)
//! │  .metadata()    │────▶ std::fs::metadata()
//! └─────────────────┘
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │ OS Filesystem│
//!   └──────────────┘
//! ```

// NativeRuntime is the one place that wraps std::fs
#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::task;

use super::{
    FileMetadata, PartialRead, READ_CHUNK_SIZE, ReadPredicate, Runtime, RuntimeError,
    RuntimeResult,
};

/// Native filesystem Runtime implementation using `std::fs`.
///
/// Blocking calls run on tokio's blocking pool via `spawn_blocking`.
#[derive(Debug, Clone, Copy)]
pub struct NativeRuntime;

impl NativeRuntime {
    /// Create a new NativeRuntime instance.
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> RuntimeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(format!("Failed to {} {}: {}", action, path.display(), e))
    }
}

fn join_error(e: task::JoinError) -> RuntimeError {
    RuntimeError::Other(format!("Task join error: {}", e))
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || std::fs::read(&path).map_err(|e| io_error("read", &path, e)))
            .await
            .map_err(join_error)?
    }

    async fn read_until(
        &self,
        path: &Path,
        mut predicate: ReadPredicate,
    ) -> RuntimeResult<PartialRead> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            let mut file = std::fs::File::open(&path).map_err(|e| io_error("open", &path, e))?;
            let mut bytes = Vec::new();
            let mut chunk = [0u8; READ_CHUNK_SIZE];

            loop {
                let read = file
                    .read(&mut chunk)
                    .map_err(|e| io_error("read", &path, e))?;
                if read == 0 {
                    return Ok(PartialRead {
                        content: String::from_utf8_lossy(&bytes).into_owned(),
                        complete: true,
                    });
                }

                bytes.extend_from_slice(&chunk[..read]);
                let content = String::from_utf8_lossy(&bytes);
                if !predicate(&content) {
                    return Ok(PartialRead {
                        content: content.into_owned(),
                        complete: false,
                    });
                }
            }
        })
        .await
        .map_err(join_error)?
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();

        task::spawn_blocking(move || {
            std::fs::write(&path, content).map_err(|e| io_error("write", &path, e))
        })
        .await
        .map_err(join_error)?
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            let metadata =
                std::fs::metadata(&path).map_err(|e| io_error("get metadata for", &path, e))?;

            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);

            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                modified,
            })
        })
        .await
        .map_err(join_error)?
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            let result = if recursive {
                std::fs::create_dir_all(&path)
            } else {
                std::fs::create_dir(&path)
            };
            result.map_err(|e| io_error("create directory", &path, e))
        })
        .await
        .map_err(join_error)?
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::remove_file(&path).map_err(|e| io_error("remove", &path, e))
        })
        .await
        .map_err(join_error)?
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::rename(&from, &to).map_err(|e| io_error("rename", &from, e))
        })
        .await
        .map_err(join_error)?
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            let entries =
                std::fs::read_dir(&path).map_err(|e| io_error("read directory", &path, e))?;

            let mut result = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| {
                    RuntimeError::Io(format!("Failed to read directory entry: {}", e))
                })?;

                if let Some(name) = entry.file_name().to_str() {
                    result.push(name.to_string());
                }
            }

            Ok(result)
        })
        .await
        .map_err(join_error)?
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        std::env::current_dir().map_err(|e| {
            RuntimeError::Io(format!("Failed to get current working directory: {}", e))
        })
    }
}
