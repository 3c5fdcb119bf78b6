//! File-based config discovery and layered loading
//!
//! Priority: environment variables > config file > defaults.

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use crate::config::GraphConfig;
use crate::error::{ConfigError, Result};

/// Config file names searched in the root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["haste.toml", "haste.json"];

/// Prefix for environment overrides, e.g. `HASTE_PREFER_NATIVE_PLATFORM=false`.
pub const ENV_PREFIX: &str = "HASTE_";

/// Searches for a config file in a project root and merges it with defaults
/// and environment overrides.
///
/// # Example
///
/// ```no_run
/// use haste_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new("/path/to/project").load().unwrap();
/// assert!(!config.roots.is_empty());
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory.
    pub fn find(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// Load the layered configuration.
    ///
    /// Works without a config file: the root itself becomes the only project
    /// root. Relative paths are resolved against the discovery root.
    pub fn load(&self) -> Result<GraphConfig> {
        let defaults = GraphConfig::new([self.root.clone()]);
        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        if let Some(path) = self.find() {
            tracing::debug!(path = %path.display(), "loading graph config");
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(&path)),
                _ => figment.merge(Toml::file(&path)),
            };
        }

        // Double underscore separates nested keys (HASTE_CACHE__EPOCH)
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: GraphConfig =
            figment
                .extract()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "configuration".to_string(),
                    hint: format!("Check haste.toml syntax and field types: {}", e),
                })?;

        config.resolve_paths(&self.root);
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Parse a TOML document into a config without touching the filesystem.
pub fn from_toml_str(source: &str) -> Result<GraphConfig> {
    toml::from_str(source).map_err(|e| ConfigError::InvalidValue {
        field: "toml".to_string(),
        hint: format!("Invalid TOML syntax: {}", e),
    })
}
