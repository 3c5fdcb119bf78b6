//! Configuration for the haste dependency graph.
//!
//! [`GraphConfig`] enumerates every option once, with defaults. Use
//! [`ConfigDiscovery`] to load `haste.toml`/`haste.json` merged with `HASTE_`
//! environment overrides, then run a [`ConfigValidator`] before handing the
//! config to the graph.

pub mod config;
pub mod discovery;
pub mod error;
pub mod validation;

pub use config::*;
pub use error::*;

pub use discovery::{CONFIG_FILE_NAMES, ConfigDiscovery, ENV_PREFIX, from_toml_str};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
