//! Virtual filesystem: the in-memory file tree and the crawler that seeds it.

pub mod crawl;
pub mod tree;

pub use crawl::{CrawlOptions, crawl};
pub use tree::{EntryKind, FileTree, IgnorePredicate, Root, RootKind};
