//! Dependency graph configuration types.
//!
//! Every option is enumerated once here with its default. Components receive
//! the typed structs below instead of loosely shaped option bags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Source extensions crawled and tried during resolution.
pub const DEFAULT_EXTENSIONS: &[&str] = &["js", "json"];

/// Extensions treated as binary assets.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "jpg", "jpeg", "png", "psd", "svg", "webp", // images
    "m4v", "mov", "mp4", "mpeg", "mpg", "webm", // video
    "aac", "aiff", "caf", "m4a", "mp3", "wav", // audio
    "html", "pdf", // documents
    "otf", "ttf", // fonts
];

/// Platforms a build can target.
pub const DEFAULT_PLATFORMS: &[&str] = &["ios", "android"];

/// Packages inside `node_modules` that may declare global module names.
pub const DEFAULT_PROVIDES_MODULE_NODE_MODULES: &[&str] = &["react-native"];

/// Epoch used when the caller does not provide one.
pub const DEFAULT_CACHE_EPOCH: &str = "haste-graph-cache";

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Budget handed to the external transformer.
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 301_000;

/// Top-level configuration for a dependency graph instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Watched project roots, in resolution order.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Roots materialized lazily and never watched (shared library paths).
    #[serde(default)]
    pub detached_roots: Vec<PathBuf>,

    /// Source extensions without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,

    /// Prefer `.native.js` over `.js` when no exact platform file exists.
    #[serde(default = "default_prefer_native_platform")]
    pub prefer_native_platform: bool,

    /// Glob patterns excluded from crawling and resolution.
    #[serde(default)]
    pub blacklist: Vec<String>,

    #[serde(default = "default_provides_module_node_modules")]
    pub provides_module_node_modules: Vec<String>,

    /// Project-wide require redirects, applied after package redirects.
    #[serde(default)]
    pub redirect: BTreeMap<String, RedirectTarget>,

    /// Polyfill files prepended to every dependency response, in order.
    #[serde(default)]
    pub polyfills: Vec<PathBuf>,

    /// Regex selecting mock files; mocks are keyed by file stem.
    #[serde(default)]
    pub mocks_pattern: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            detached_roots: Vec::new(),
            extensions: default_extensions(),
            asset_extensions: default_asset_extensions(),
            platforms: default_platforms(),
            prefer_native_platform: default_prefer_native_platform(),
            blacklist: Vec::new(),
            provides_module_node_modules: default_provides_module_node_modules(),
            redirect: BTreeMap::new(),
            polyfills: Vec::new(),
            mocks_pattern: None,
            cache: CacheConfig::default(),
            watch: WatchConfig::default(),
            transform_timeout_ms: default_transform_timeout_ms(),
        }
    }
}

impl GraphConfig {
    /// Configuration with the given watched roots and defaults elsewhere.
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Build from an arbitrary JSON value (e.g. a `haste` field embedded elsewhere).
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(value).map_err(|e| crate::ConfigError::InvalidValue {
            field: "configuration".to_string(),
            hint: e.to_string(),
        })
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let absolutize = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        self.roots.iter_mut().for_each(absolutize);
        self.detached_roots.iter_mut().for_each(absolutize);
        self.polyfills.iter_mut().for_each(absolutize);
        if let Some(dir) = self.cache.dir.as_mut() {
            absolutize(dir);
        }
    }

    /// Watched roots followed by detached roots.
    pub fn all_roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots.iter().chain(self.detached_roots.iter())
    }

    pub fn is_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p == platform)
    }
}

/// Replacement for a redirected require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RedirectTarget {
    /// Resolve this name instead.
    Module(String),
    /// `false` disables the require; it resolves to an empty module.
    Disabled(bool),
}

impl RedirectTarget {
    pub fn is_disabled(&self) -> bool {
        matches!(self, RedirectTarget::Disabled(false))
    }
}

/// Derived fact cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the persisted snapshot. `None` keeps the cache in memory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Changing the epoch invalidates every persisted fact.
    #[serde(default = "default_cache_epoch")]
    pub epoch: String,

    /// Ignore any existing snapshot on startup.
    #[serde(default)]
    pub reset: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            epoch: default_cache_epoch(),
            reset: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Start a filesystem watcher over the roots when the graph is built
    /// without one.
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    /// Quiet period before a burst of events for one path is delivered.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Extra path segments ignored by the watcher (e.g. "build").
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            debounce_ms: default_debounce_ms(),
            ignore: Vec::new(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_extensions() -> Vec<String> {
    to_strings(DEFAULT_EXTENSIONS)
}

fn default_asset_extensions() -> Vec<String> {
    to_strings(DEFAULT_ASSET_EXTENSIONS)
}

fn default_platforms() -> Vec<String> {
    to_strings(DEFAULT_PLATFORMS)
}

fn default_prefer_native_platform() -> bool {
    true
}

fn default_provides_module_node_modules() -> Vec<String> {
    to_strings(DEFAULT_PROVIDES_MODULE_NODE_MODULES)
}

fn default_cache_epoch() -> String {
    DEFAULT_CACHE_EPOCH.to_string()
}

fn default_watch_enabled() -> bool {
    false
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_transform_timeout_ms() -> u64 {
    DEFAULT_TRANSFORM_TIMEOUT_MS
}
