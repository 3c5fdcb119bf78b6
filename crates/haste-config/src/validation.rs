//! Pluggable config validation strategies
//!
//! Separates filesystem validation (roots exist) from schema validation
//! (patterns compile, lists are well formed).

use globset::Glob;
use regex::Regex;
use std::path::PathBuf;

use crate::config::{GraphConfig, RedirectTarget};
use crate::error::{ConfigError, Result};

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &GraphConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use haste_config::{ConfigValidator, GraphConfig, SchemaValidator};
///
/// let config = GraphConfig::new(["/proj"]);
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &GraphConfig) -> Result<()> {
        if config.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }

        if config.extensions.is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "at least one source extension is required".to_string(),
                hint: Some("Use the default [\"js\", \"json\"]".to_string()),
            });
        }

        for ext in config.extensions.iter().chain(&config.asset_extensions) {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::SchemaValidation {
                    message: format!("invalid extension '{}'", ext),
                    hint: Some("Extensions are written without the leading dot".to_string()),
                });
            }
        }

        for platform in &config.platforms {
            if platform.is_empty() || platform.contains('.') || platform == "native" {
                return Err(ConfigError::SchemaValidation {
                    message: format!("invalid platform '{}'", platform),
                    hint: Some(
                        "'native' is implied by prefer_native_platform and cannot be a build target"
                            .to_string(),
                    ),
                });
            }
        }

        for pattern in &config.blacklist {
            Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(pattern) = &config.mocks_pattern {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }

        for (name, target) in &config.redirect {
            if *target == RedirectTarget::Disabled(true) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("redirect for '{}' must be a module name or false", name),
                    hint: None,
                });
            }
        }

        if config.cache.epoch.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "cache epoch cannot be empty".to_string(),
                hint: Some("Leave 'epoch' unset to use the default".to_string()),
            });
        }

        Ok(())
    }
}

/// Filesystem validator
///
/// Runs the schema checks, then verifies that every root and polyfill exists.
pub struct FsValidator;

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &GraphConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        for root in config.all_roots() {
            if !root.is_dir() {
                return Err(ConfigError::RootNotFound(root.clone()));
            }
        }

        for polyfill in &config.polyfills {
            if !polyfill.is_file() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("polyfill not found: {}", polyfill.display()),
                    hint: Some("Polyfill paths are resolved against the project root".to_string()),
                });
            }
        }

        if let Some(dir) = &config.cache.dir {
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigError::CacheDirNotDirectory(PathBuf::from(dir)));
            }
        }

        Ok(())
    }
}

pub fn validate_schema(config: &GraphConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

pub fn validate_fs(config: &GraphConfig) -> Result<()> {
    FsValidator.validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requires_roots() {
        let err = validate_schema(&GraphConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoRoots));
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let mut config = GraphConfig::new(["/proj"]);
        config.extensions = vec![".js".to_string()];
        assert!(matches!(
            validate_schema(&config),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_rejects_native_platform() {
        let mut config = GraphConfig::new(["/proj"]);
        config.platforms.push("native".to_string());
        assert!(validate_schema(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_glob() {
        let mut config = GraphConfig::new(["/proj"]);
        config.blacklist.push("**/{unclosed".to_string());
        assert!(matches!(
            validate_schema(&config),
            Err(ConfigError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_mocks_pattern() {
        let mut config = GraphConfig::new(["/proj"]);
        config.mocks_pattern = Some("(".to_string());
        assert!(matches!(
            validate_schema(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_rejects_redirect_true() {
        let mut config = GraphConfig::new(["/proj"]);
        config
            .redirect
            .insert("fs".to_string(), RedirectTarget::Disabled(true));
        assert!(validate_schema(&config).is_err());
    }

    #[test]
    fn test_fs_validator_checks_roots() {
        let temp = TempDir::new().unwrap();
        let config = GraphConfig::new([temp.path().to_path_buf()]);
        validate_fs(&config).unwrap();

        let missing = GraphConfig::new([temp.path().join("missing")]);
        assert!(matches!(
            validate_fs(&missing),
            Err(ConfigError::RootNotFound(_))
        ));
    }
}
