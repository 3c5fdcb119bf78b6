//! Platform variants and blacklists.
//!
//! A platform variant is the second-to-last extension of a file name
//! (`Button.ios.js`). Variants for other platforms are excluded from a build,
//! and the configured blacklist globs are excluded from every build.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashMap;
use std::path::Path;

use crate::error::{GraphError, Result};

/// Map key for files without a platform suffix.
pub const GENERIC_PLATFORM: &str = "generic";

/// Suffix shared by every native platform.
pub const NATIVE_PLATFORM: &str = "native";

/// Platforms whose variants are always recognized, whatever the config says.
const BUILTIN_PLATFORMS: &[&str] = &["ios", "android", "web"];

/// Return the platform suffix of `path` when it is one of `platforms` or
/// `native` (`Foo.ios.js` → `ios`).
pub fn platform_extension<'a, S: AsRef<str>>(path: &'a Path, platforms: &[S]) -> Option<&'a str> {
    let file_name = path.file_name()?.to_str()?;
    let mut parts = file_name.rsplit('.');
    parts.next()?; // extension
    let candidate = parts.next()?;
    // A bare "ios.js" has no base name, so "ios" is the name, not a suffix
    parts.next()?;

    let known = candidate == NATIVE_PLATFORM
        || BUILTIN_PLATFORMS.contains(&candidate)
        || platforms.iter().any(|p| p.as_ref() == candidate);
    known.then_some(candidate)
}

/// Compiled exclusion rules: global globs plus per-platform variant filters.
#[derive(Debug, Clone)]
pub struct Blacklist {
    global: GlobSet,
    per_platform: FxHashMap<String, GlobSet>,
}

impl Blacklist {
    /// Compile `patterns` and derive a filter for each configured platform
    /// that rejects every other platform's variants.
    pub fn new<S: AsRef<str>>(patterns: &[String], platforms: &[S]) -> Result<Self> {
        let global = build_set(patterns.iter().map(String::as_str))?;

        let mut all: Vec<&str> = BUILTIN_PLATFORMS.to_vec();
        for platform in platforms {
            if !all.contains(&platform.as_ref()) {
                all.push(platform.as_ref());
            }
        }

        let mut per_platform = FxHashMap::default();
        for &platform in &all {
            let others: Vec<&str> = all.iter().copied().filter(|p| *p != platform).collect();
            if others.is_empty() {
                continue;
            }
            let pattern = format!("**/*.{{{}}}.*", others.join(","));
            per_platform.insert(platform.to_string(), build_set([pattern.as_str()])?);
        }

        Ok(Self {
            global,
            per_platform,
        })
    }

    /// Blacklist with no global patterns.
    pub fn platforms_only<S: AsRef<str>>(platforms: &[S]) -> Result<Self> {
        Self::new(&[], platforms)
    }

    /// Path matches a configured blacklist glob.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.global.is_match(path)
    }

    /// Path is ignored globally or is another platform's variant.
    pub fn is_excluded(&self, path: &Path, platform: Option<&str>) -> bool {
        if self.is_ignored(path) {
            return true;
        }
        platform
            .and_then(|p| self.per_platform.get(p))
            .is_some_and(|set| set.is_match(path))
    }
}

fn build_set<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            GraphError::from(haste_config::ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        GraphError::from(haste_config::ConfigError::InvalidGlob {
            pattern: "<set>".to_string(),
            reason: e.to_string(),
        })
    })
}
