//! Asset resolution.
//!
//! The resolver asks an [`AssetResolver`] first for every required name. The
//! default [`AssetServer`] understands two forms:
//!
//! - absolute paths with an asset extension, matched against scale and
//!   platform variants in the same directory (`/proj/img/icon.png` finds
//!   `icon@2x.png`)
//! - `image!name` references, looked up by file name across the tree
//!
//! It also keeps per-asset scale records so a caller can pick the variant
//! closest to a requested resolution.

mod name;

pub use name::AssetName;

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};
use crate::fs::FileTree;
use crate::helpers::extension;
use crate::watch::ChangeKind;

const IMAGE_PREFIX: &str = "image!";
const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Resolves logical asset names to files.
pub trait AssetResolver: Send + Sync + fmt::Debug {
    /// File backing `name`, or `None` when `name` is not an asset reference.
    fn resolve_asset_path(&self, name: &str, tree: &FileTree, platform: Option<&str>)
    -> Option<PathBuf>;

    /// Index the assets currently in `tree`.
    fn build(&self, _tree: &FileTree) {}

    /// Keep the index in sync with a file change.
    fn process_file_change(&self, _kind: ChangeKind, _path: &Path) {}
}

/// Scale variants of one asset, sorted by ascending scale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetRecord {
    pub scales: Vec<f32>,
    pub files: Vec<PathBuf>,
}

impl AssetRecord {
    fn insert(&mut self, scale: f32, file: PathBuf) {
        if self.files.contains(&file) {
            return;
        }
        let at = self.scales.partition_point(|s| *s <= scale);
        self.scales.insert(at, scale);
        self.files.insert(at, file);
    }

    fn remove(&mut self, file: &Path) {
        if let Some(at) = self.files.iter().position(|f| f == file) {
            self.scales.remove(at);
            self.files.remove(at);
        }
    }

    /// First file whose scale is at least `resolution`, else the largest.
    pub fn select(&self, resolution: f32) -> Option<&Path> {
        self.scales
            .iter()
            .position(|s| *s >= resolution)
            .and_then(|at| self.files.get(at))
            .or_else(|| self.files.last())
            .map(PathBuf::as_path)
    }
}

type RecordKey = (String, Option<String>);

/// Default [`AssetResolver`].
#[derive(Debug)]
pub struct AssetServer {
    asset_extensions: Vec<String>,
    platforms: Vec<String>,
    records: RwLock<FxHashMap<RecordKey, AssetRecord>>,
}

impl AssetServer {
    pub fn new(asset_extensions: Vec<String>, platforms: Vec<String>) -> Self {
        Self {
            asset_extensions,
            platforms,
            records: RwLock::new(FxHashMap::default()),
        }
    }

    fn has_asset_extension(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.asset_extensions.iter().any(|a| a == ext))
    }

    fn add(&self, path: &Path) {
        let parsed = AssetName::parse(path, &self.platforms);
        self.records
            .write()
            .entry((parsed.asset_name, parsed.platform))
            .or_default()
            .insert(parsed.resolution, path.to_path_buf());
    }

    fn remove(&self, path: &Path) {
        let parsed = AssetName::parse(path, &self.platforms);
        let key = (parsed.asset_name, parsed.platform);
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(&key) {
            record.remove(path);
            if record.files.is_empty() {
                records.remove(&key);
            }
        }
    }

    /// Scale record for `asset_path`, preferring the platform-specific one.
    pub fn record(&self, asset_path: &Path, platform: Option<&str>) -> Result<AssetRecord> {
        let parsed = AssetName::parse(asset_path, &self.platforms);
        let records = self.records.read();
        platform
            .and_then(|p| records.get(&(parsed.asset_name.clone(), Some(p.to_string()))))
            .or_else(|| records.get(&(parsed.asset_name.clone(), None)))
            .cloned()
            .ok_or_else(|| {
                GraphError::FileNotFound(asset_path.to_path_buf())
            })
    }

    /// File to serve for `asset_path`: the requested scale rounded up to the
    /// nearest available one.
    pub fn select(&self, asset_path: &Path, platform: Option<&str>) -> Result<PathBuf> {
        let requested = AssetName::parse(asset_path, &self.platforms).resolution;
        let record = self.record(asset_path, platform)?;
        record
            .select(requested)
            .map(Path::to_path_buf)
            .ok_or_else(|| GraphError::FileNotFound(asset_path.to_path_buf()))
    }

    fn resolve_absolute(&self, path: &Path, tree: &FileTree, platform: Option<&str>) -> Option<PathBuf> {
        let dir = path.parent()?;
        if !tree.dir_exists(dir) {
            tracing::warn!(dir = %dir.display(), "asset directory does not exist");
            return None;
        }

        let parsed = AssetName::parse(path, &self.platforms);
        let platform_suffix = platform
            .map(|p| format!(r"(\.{})?", regex::escape(p)))
            .unwrap_or_default();
        let pattern = Regex::new(&format!(
            r"/{}(@[\d.]+x)?{}\.{}$",
            regex::escape(&parsed.name),
            platform_suffix,
            regex::escape(&parsed.asset_type)
        ))
        .ok()?;

        tree.matches(dir, &pattern).ok()?.into_iter().next()
    }

    fn resolve_image(&self, name: &str, platform: Option<&str>) -> Option<PathBuf> {
        let mut asset_name = name.to_string();
        if !self.has_asset_extension(Path::new(name)) {
            asset_name = format!("{name}.{DEFAULT_IMAGE_EXTENSION}");
        }

        let records = self.records.read();
        let record = platform
            .and_then(|p| records.get(&(asset_name.clone(), Some(p.to_string()))))
            .or_else(|| records.get(&(asset_name.clone(), None)));
        match record.and_then(|r| r.files.first()) {
            Some(file) => Some(file.clone()),
            None => {
                tracing::warn!(asset = %asset_name, "image asset does not exist");
                None
            }
        }
    }
}

impl AssetResolver for AssetServer {
    fn resolve_asset_path(
        &self,
        name: &str,
        tree: &FileTree,
        platform: Option<&str>,
    ) -> Option<PathBuf> {
        if let Some(image) = name.strip_prefix(IMAGE_PREFIX) {
            return self.resolve_image(image, platform);
        }

        let path = Path::new(name);
        if path.is_absolute() && self.has_asset_extension(path) {
            return self.resolve_absolute(path, tree, platform);
        }

        None
    }

    fn build(&self, tree: &FileTree) {
        self.records.write().clear();
        let files = tree.find_files_by_exts(&self.asset_extensions);
        for file in &files {
            self.add(file);
        }
        tracing::debug!(assets = files.len(), "indexed assets");
    }

    fn process_file_change(&self, kind: ChangeKind, path: &Path) {
        if !self.has_asset_extension(path) {
            return;
        }
        match kind {
            ChangeKind::Add => self.add(path),
            ChangeKind::Delete => self.remove(path),
            ChangeKind::Change => {}
        }
    }
}
