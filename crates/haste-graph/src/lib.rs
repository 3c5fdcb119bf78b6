//! # haste-graph
//!
//! Incremental dependency graph for a JavaScript module bundler.
//!
//! The graph mirrors a set of project roots in memory, indexes every module
//! by path and by global ("haste") name, and resolves `require` references
//! into an ordered, de-duplicated dependency list. File changes reported by a
//! watcher patch the mirror, the module index and the global name map in
//! place, so a long-running dev server never has to start over.
//!
//! ```text
//!  ┌─────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐
//!  │  crawl  │──▶│ FileTree │──▶│ ModuleIndex │──▶│ HasteMap │
//!  └─────────┘   └──────────┘   └─────────────┘   └──────────┘
//!                     ▲                ▲                ▲
//!                     └──── watcher events (serialized) ┘
//!
//!  get_dependencies(entry)
//!    └─▶ GraphWalker ─▶ ResolutionRequest ─▶ ResolutionResponse
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use haste_graph::{DependencyGraph, DependencyOptions, GraphConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> haste_graph::Result<()> {
//! let graph = DependencyGraph::builder(GraphConfig::new(["/path/to/project"])).build()?;
//! let response = graph
//!     .get_dependencies("index.ios.js", DependencyOptions::default())
//!     .await?;
//! for module in response.dependencies() {
//!     println!("{}", module.path().display());
//! }
//! # Ok(()) }
//! ```

pub mod asset;
pub mod cache;
pub mod context;
pub mod error;
pub mod fs;
pub mod graph;
pub mod haste_map;
pub mod helpers;
pub mod module;
pub mod platform;
pub mod resolver;
pub mod response;
pub mod runtime;
pub mod transform;
pub mod walker;
pub mod watch;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(test)]
mod tests;

pub use asset::{AssetName, AssetResolver, AssetServer};
pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, DependencyOptions, GraphBuilder, ThrowPredicate};
pub use module::{Module, ModuleData, ModuleId, ModuleKind, Package};
pub use resolver::ResolutionRequest;
pub use response::{ResolutionResponse, ResolvedPair};
pub use runtime::{NativeRuntime, Runtime, RuntimeError};
pub use transform::{TransformError, TransformOptions, TransformOutput, Transformer};
pub use walker::ErrorCallback;
pub use watch::{ChangeKind, FileWatcher, ManualWatcher, NotifyWatcher, WatchEvent};

pub use haste_config::{GraphConfig, RedirectTarget};
