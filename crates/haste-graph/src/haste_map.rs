//! Global module names ("haste" names).
//!
//! Files declaring `@providesModule Name` and named `package.json` files are
//! addressable by that name from anywhere. Entries are kept per platform so
//! `Button.ios.js` and `Button.android.js` can both provide `Button`:
//!
//! ```text
//! "Button"  ─┬─ ios      → /proj/Button.ios.js
//!            ├─ android  → /proj/Button.android.js
//!            └─ generic  → /proj/Button.js
//! ```
//!
//! Two files providing the same name for the same platform is an error.

use futures::future::join_all;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::helpers::{PACKAGE_JSON, extension};
use crate::module::{Module, Package};
use crate::platform::{GENERIC_PLATFORM, NATIVE_PLATFORM, platform_extension};
use crate::watch::ChangeKind;

#[derive(Debug, Clone)]
pub enum HasteEntry {
    Module(Arc<Module>),
    Package(Arc<Package>),
}

impl HasteEntry {
    pub fn path(&self) -> &Path {
        match self {
            HasteEntry::Module(module) => module.path(),
            HasteEntry::Package(package) => &package.path,
        }
    }
}

#[derive(Debug, Default)]
pub struct HasteMap {
    names: FxHashMap<String, FxHashMap<String, HasteEntry>>,
}

enum Candidate {
    Module(PathBuf),
    Package(PathBuf),
}

impl HasteMap {
    /// Scan every file in the tree.
    pub async fn build(ctx: &GraphContext) -> Result<Self> {
        let candidates: Vec<Candidate> = ctx
            .tree
            .all_files()
            .into_iter()
            .filter_map(|path| classify(ctx, path))
            .collect();

        let entries = join_all(candidates.iter().map(|c| provided(ctx, c))).await;

        let mut map = HasteMap::default();
        for entry in entries {
            if let Some((name, entry)) = entry? {
                map.insert(&ctx.config.platforms, name, entry)?;
            }
        }

        tracing::debug!(names = map.names.len(), "built global module map");
        Ok(map)
    }

    /// Provider of `name` for `platform`: the platform variant, then the
    /// native variant when preferred, then the generic one.
    pub fn get(&self, name: &str, platform: Option<&str>, prefer_native: bool) -> Option<&HasteEntry> {
        let providers = self.names.get(name)?;
        platform
            .and_then(|p| providers.get(p))
            .or_else(|| {
                prefer_native
                    .then(|| providers.get(NATIVE_PLATFORM))
                    .flatten()
            })
            .or_else(|| providers.get(GENERIC_PLATFORM))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names and their providers, sorted.
    pub fn entries(&self) -> Vec<(String, String, PathBuf)> {
        let mut entries: Vec<_> = self
            .names
            .iter()
            .flat_map(|(name, providers)| {
                providers
                    .iter()
                    .map(|(platform, entry)| (name.clone(), platform.clone(), entry.path().to_path_buf()))
            })
            .collect();
        entries.sort();
        entries
    }

    fn insert(&mut self, platforms: &[String], name: String, entry: HasteEntry) -> Result<()> {
        let platform = platform_extension(entry.path(), platforms)
            .unwrap_or(GENERIC_PLATFORM)
            .to_string();
        let providers = self.names.entry(name.clone()).or_default();

        if let Some(existing) = providers.get(&platform) {
            if existing.path() != entry.path() {
                return Err(GraphError::SymbolCollision {
                    name,
                    platform,
                    existing: existing.path().to_path_buf(),
                    duplicate: entry.path().to_path_buf(),
                });
            }
        }

        providers.insert(platform, entry);
        Ok(())
    }

    /// `(name, platform)` pairs provided by `path`, sorted.
    fn provided_by(&self, path: &Path) -> Vec<(String, String)> {
        let mut provided: Vec<_> = self
            .names
            .iter()
            .flat_map(|(name, providers)| {
                providers
                    .iter()
                    .filter(|(_, entry)| entry.path() == path)
                    .map(|(platform, _)| (name.clone(), platform.clone()))
            })
            .collect();
        provided.sort();
        provided
    }

    fn remove_path(&mut self, path: &Path) {
        self.names.retain(|_, providers| {
            providers.retain(|_, entry| entry.path() != path);
            !providers.is_empty()
        });
    }
}

fn classify(ctx: &GraphContext, path: PathBuf) -> Option<Candidate> {
    if ctx.helpers.is_node_modules_dir(&path) {
        return None;
    }
    if path.file_name().is_some_and(|n| n == PACKAGE_JSON) {
        return Some(Candidate::Package(path));
    }
    let ext = extension(&path)?;
    ctx.config
        .extensions
        .iter()
        .any(|e| e == ext)
        .then_some(Candidate::Module(path))
}

async fn provided(ctx: &GraphContext, candidate: &Candidate) -> Result<Option<(String, HasteEntry)>> {
    match candidate {
        Candidate::Module(path) => {
            let module = ctx.modules.get_module(path);
            Ok(module
                .declared_id(ctx)
                .await?
                .map(|name| (name, HasteEntry::Module(module))))
        }
        Candidate::Package(path) => {
            let package = ctx.modules.get_package(path);
            match package.name(&ctx.tree, &ctx.cache).await {
                Ok(name) => Ok(name.map(|name| (name, HasteEntry::Package(package)))),
                Err(GraphError::InvalidPackageJson { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping malformed package.json");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Patch the map in `ctx` for a single file change. Returns `true` when the
/// names provided by `path` changed.
pub async fn process_file_change(ctx: &GraphContext, kind: ChangeKind, path: &Path) -> Result<bool> {
    let before = {
        let mut map = ctx.haste.write();
        let before = map.provided_by(path);
        map.remove_path(path);
        before
    };
    if kind == ChangeKind::Delete {
        return Ok(!before.is_empty());
    }

    let Some(candidate) = classify(ctx, path.to_path_buf()) else {
        return Ok(!before.is_empty());
    };
    if let Some((name, entry)) = provided(ctx, &candidate).await? {
        let mut map = ctx.haste.write();
        map.insert(&ctx.config.platforms, name, entry)?;
        return Ok(map.provided_by(path) != before);
    }
    Ok(!before.is_empty())
}
