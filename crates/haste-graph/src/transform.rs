//! Transform service boundary.
//!
//! The code transformer is an external collaborator. The graph only needs its
//! output code and, optionally, the dependency names it discovered. When the
//! transformer leaves `dependencies` empty the module falls back to
//! [`crate::module::extract`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Options forwarded to the transformer and folded into the fact cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformOptions {
    pub platform: Option<String>,
    pub dev: bool,
}

impl TransformOptions {
    /// Stable digest used to key cached transform output.
    pub fn cache_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.platform.as_deref().unwrap_or("").as_bytes());
        hasher.update(&[self.dev as u8]);
        hasher.finalize().to_hex()[..16].to_string()
    }
}

/// Transformer output.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub code: String,
    /// Dependency names; `None` asks the graph to extract them from `code`.
    pub dependencies: Option<Vec<String>>,
    pub async_dependencies: Option<Vec<Vec<String>>>,
    pub map: Option<String>,
}

/// Failure reported by the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformError {
    pub message: String,
    pub file: PathBuf,
    pub snippet: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl TransformError {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            snippet: None,
            line: None,
            column: None,
        }
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransformError: {}", self.file.display())?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, ":{}:{}", line, column)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{}", snippet)?;
        }
        Ok(())
    }
}

impl std::error::Error for TransformError {}

/// Opaque transform service.
#[async_trait]
pub trait Transformer: Send + Sync + fmt::Debug {
    async fn transform(
        &self,
        source: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<TransformOutput, TransformError>;
}
