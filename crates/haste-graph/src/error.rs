//! Error taxonomy for the dependency graph.
//!
//! Callers branch on these variants: [`GraphError::UnableToResolve`] is a
//! per-edge failure the walker may swallow, the two "not found" variants let
//! the resolver tell a missing file from a path outside every root, and
//! everything else aborts the operation in progress.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::CacheError;
use crate::runtime::RuntimeError;
use crate::transform::TransformError;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A required name matched no module
    #[error("Unable to resolve module '{name}' from '{}': {reason}", from.display())]
    UnableToResolve {
        name: String,
        from: PathBuf,
        reason: String,
    },

    /// The path lies outside every declared root
    #[error("Path is not in any of the roots: {}", .0.display())]
    NotFoundInRoots(PathBuf),

    /// The path lies inside a root but does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cannot find entry file {} in any of the roots", .0.display())]
    EntryNotFound(PathBuf),

    /// Programmer error: an API that requires an absolute path got a relative one
    #[error("Expected an absolute path, got {}", .0.display())]
    RelativePath(PathBuf),

    #[error("Unrecognized platform '{platform}' (configured: {})", configured.join(", "))]
    UnrecognizedPlatform {
        platform: String,
        configured: Vec<String>,
    },

    /// Two files declare the same global name for the same platform
    #[error(
        "Global module naming collision:\n  Duplicate module name: {name}\n  Platform: {platform}\n  Paths: {} collides with {}",
        duplicate.display(),
        existing.display()
    )]
    SymbolCollision {
        name: String,
        platform: String,
        existing: PathBuf,
        duplicate: PathBuf,
    },

    #[error("Invalid package.json at {}: {reason}", path.display())]
    InvalidPackageJson { path: PathBuf, reason: String },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid configuration: {0}")]
    Config(Arc<haste_config::ConfigError>),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("File watcher error: {0}")]
    Watcher(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraphError {
    pub(crate) fn unable_to_resolve(
        name: impl Into<String>,
        from: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        GraphError::UnableToResolve {
            name: name.into(),
            from: from.into(),
            reason: reason.into(),
        }
    }

    /// Per-edge resolution failure, recoverable by omitting the edge.
    pub fn is_unable_to_resolve(&self) -> bool {
        matches!(self, GraphError::UnableToResolve { .. })
    }

    /// Either flavor of "does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::FileNotFound(_) | GraphError::NotFoundInRoots(_)
        )
    }
}

impl From<RuntimeError> for GraphError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::FileNotFound(path) => GraphError::FileNotFound(path),
            RuntimeError::Io(message) => GraphError::Io(message),
            RuntimeError::Other(message) => GraphError::Internal(message),
        }
    }
}

impl From<haste_config::ConfigError> for GraphError {
    fn from(err: haste_config::ConfigError) -> Self {
        GraphError::Config(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for GraphError {
    fn from(err: tokio::task::JoinError) -> Self {
        GraphError::Internal(format!("Task join error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_not_found_maps_to_file_not_found() {
        let err: GraphError = RuntimeError::FileNotFound(PathBuf::from("/a.js")).into();
        assert!(err.is_not_found());
        assert!(!err.is_unable_to_resolve());
    }

    #[test]
    fn test_unable_to_resolve_message() {
        let err = GraphError::unable_to_resolve("missing", "/proj/A.js", "not found");
        assert!(err.is_unable_to_resolve());
        assert_eq!(
            err.to_string(),
            "Unable to resolve module 'missing' from '/proj/A.js': not found"
        );
    }

    #[test]
    fn test_collision_message_names_both_paths() {
        let err = GraphError::SymbolCollision {
            name: "Foo".to_string(),
            platform: "generic".to_string(),
            existing: PathBuf::from("/proj/a/Foo.js"),
            duplicate: PathBuf::from("/proj/b/Foo.js"),
        };
        let message = err.to_string();
        assert!(message.contains("Duplicate module name: Foo"));
        assert!(message.contains("/proj/b/Foo.js collides with /proj/a/Foo.js"));
    }
}
