//! `package.json` wrapper.
//!
//! Only the fields the resolver needs are parsed: `name`, `main`, and the
//! replacement field (`react-native`, falling back to `browser`). A string
//! replacement overrides `main`; an object is a redirect table:
//!
//! ```json
//! {
//!   "main": "./lib/index",
//!   "browser": { "fs": false, "./lib/node.js": "./lib/browser.js" }
//! }
//! ```

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::cache::FactCache;
use crate::error::{GraphError, Result};
use crate::fs::FileTree;

const DEFAULT_MAIN: &str = "index";
const DEFAULT_EXTENSION: &str = ".js";

/// Parsed subset of `package.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub browser: Option<Replacements>,
    #[serde(default, rename = "react-native")]
    pub react_native: Option<Replacements>,
}

impl PackageJson {
    pub fn parse(source: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// `react-native` wins over `browser`.
    pub fn replacements(&self) -> Option<&Replacements> {
        self.react_native.as_ref().or(self.browser.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Replacements {
    Main(String),
    Map(IndexMap<String, Replacement>),
    /// Any other shape (`"browser": false`, arrays) is ignored.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Replacement {
    Path(String),
    Disabled(bool),
}

/// Outcome of [`Package::redirect_require`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// No replacement applies.
    Unchanged,
    /// The name is mapped to `false`.
    Disabled,
    /// Replacement name, or absolute path for redirected files.
    To(String),
}

#[derive(Debug)]
pub struct Package {
    pub path: PathBuf,
    pub root: PathBuf,
    json: OnceCell<Arc<PackageJson>>,
}

impl Package {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            root,
            json: OnceCell::new(),
        }
    }

    pub async fn read(&self, tree: &FileTree) -> Result<Arc<PackageJson>> {
        let json = self
            .json
            .get_or_try_init(|| async {
                let source = tree.read_to_string(&self.path).await?;
                let json =
                    PackageJson::parse(&source).map_err(|e| GraphError::InvalidPackageJson {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?;
                Ok::<_, GraphError>(Arc::new(json))
            })
            .await?;
        Ok(json.clone())
    }

    pub async fn name(&self, tree: &FileTree, cache: &FactCache) -> Result<Option<String>> {
        cache
            .get(&self.path, "package-name", || async {
                Ok(self.read(tree).await?.name.clone())
            })
            .await
    }

    /// Absolute path of the package's main module.
    pub async fn main(&self, tree: &FileTree) -> Result<PathBuf> {
        let json = self.read(tree).await?;
        Ok(self.root.join(main_entry(&json)).clean())
    }

    /// Apply the package's redirect table to `name`.
    ///
    /// Bare names are looked up as written. Absolute paths are looked up
    /// relative to the package root (`./lib/node.js`), also with each of
    /// `extensions` appended. Relative names must be made absolute first.
    pub async fn redirect_require(
        &self,
        name: &str,
        tree: &FileTree,
        extensions: &[String],
    ) -> Result<Redirect> {
        if name.starts_with('.') {
            return Err(GraphError::RelativePath(PathBuf::from(name)));
        }

        let json = self.read(tree).await?;
        let Some(Replacements::Map(map)) = json.replacements() else {
            return Ok(Redirect::Unchanged);
        };

        let absolute = Path::new(name);
        if !absolute.is_absolute() {
            return Ok(match map.get(name) {
                Some(Replacement::Path(to)) => Redirect::To(to.clone()),
                Some(Replacement::Disabled(false)) => Redirect::Disabled,
                _ => Redirect::Unchanged,
            });
        }

        let Ok(relative) = absolute.strip_prefix(&self.root) else {
            return Ok(Redirect::Unchanged);
        };
        let relative = format!("./{}", relative.to_string_lossy());

        let candidates = std::iter::once(relative.clone())
            .chain(extensions.iter().map(|ext| format!("{relative}.{ext}")));
        for candidate in candidates {
            match map.get(&candidate) {
                Some(Replacement::Path(to)) => {
                    let target = self.root.join(to).clean();
                    return Ok(Redirect::To(target.to_string_lossy().into_owned()));
                }
                Some(Replacement::Disabled(false)) => return Ok(Redirect::Disabled),
                _ => {}
            }
        }

        Ok(Redirect::Unchanged)
    }
}

/// Main module path relative to the package root, extension included.
fn main_entry(json: &PackageJson) -> String {
    let replacements = json.replacements();

    let main = match replacements {
        Some(Replacements::Main(main)) => Some(main.as_str()),
        _ => json.main.as_deref(),
    }
    .filter(|m| !m.is_empty());

    let (main, ext) = match main {
        Some(main) => {
            let ext = Path::new(main)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
            let main = main.strip_prefix("./").unwrap_or(main);
            let main = main
                .strip_suffix(".js")
                .or_else(|| main.strip_suffix(".json"))
                .unwrap_or(main);
            (main.to_string(), ext)
        }
        None => (DEFAULT_MAIN.to_string(), DEFAULT_EXTENSION.to_string()),
    };

    if let Some(Replacements::Map(map)) = replacements {
        let with_ext = format!("{main}{ext}");
        let keys = [
            main.clone(),
            with_ext.clone(),
            format!("./{main}"),
            format!("./{with_ext}"),
        ];
        if let Some(Replacement::Path(to)) = keys.iter().find_map(|k| map.get(k)) {
            let to = to.strip_prefix("./").unwrap_or(to);
            return if to.ends_with(&ext) {
                to.to_string()
            } else {
                format!("{to}{ext}")
            };
        }
    }

    format!("{main}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::Root;
    use crate::runtime::test_utils::TestRuntime;
    use std::fs;
    use tempfile::TempDir;

    fn json(source: &str) -> PackageJson {
        PackageJson::parse(source).unwrap()
    }

    #[test]
    fn test_main_defaults() {
        assert_eq!(main_entry(&json("{}")), "index.js");
        assert_eq!(main_entry(&json(r#"{"main": "./lib/index.js"}"#)), "lib/index.js");
        assert_eq!(main_entry(&json(r#"{"main": "lib/entry"}"#)), "lib/entry.js");
        assert_eq!(main_entry(&json(r#"{"main": "data.json"}"#)), "data.json");
    }

    #[test]
    fn test_string_replacement_overrides_main() {
        let pkg = json(r#"{"main": "node.js", "browser": "./browser.js"}"#);
        assert_eq!(main_entry(&pkg), "browser.js");

        // react-native beats browser
        let pkg = json(r#"{"main": "node.js", "browser": "browser.js", "react-native": "native.js"}"#);
        assert_eq!(main_entry(&pkg), "native.js");
    }

    #[test]
    fn test_map_replacement_of_main() {
        let pkg = json(r#"{"main": "lib/node", "browser": {"./lib/node.js": "./lib/web.js"}}"#);
        assert_eq!(main_entry(&pkg), "lib/web.js");
    }

    #[test]
    fn test_odd_replacement_shapes_are_ignored() {
        let pkg = json(r#"{"main": "a.js", "browser": false}"#);
        assert!(matches!(pkg.browser, Some(Replacements::Other(_))));
        assert_eq!(main_entry(&pkg), "a.js");
    }

    async fn package(temp: &TempDir, source: &str) -> (Package, FileTree) {
        let root = temp.path();
        fs::write(root.join("package.json"), source).unwrap();
        let tree = FileTree::new(
            Arc::new(TestRuntime::new(root.to_path_buf())),
            vec![Root::watched(root)],
            Arc::new(|_: &Path| false),
        );
        tree.build(vec![root.join("package.json")]);
        (Package::new(root.join("package.json")), tree)
    }

    #[tokio::test]
    async fn test_redirect_bare_names() {
        let temp = TempDir::new().unwrap();
        let (pkg, tree) = package(&temp, r#"{"browser": {"fs": false, "http": "stream-http"}}"#).await;

        assert_eq!(pkg.redirect_require("fs", &tree, &[]).await.unwrap(), Redirect::Disabled);
        assert_eq!(
            pkg.redirect_require("http", &tree, &[]).await.unwrap(),
            Redirect::To("stream-http".into())
        );
        assert_eq!(pkg.redirect_require("os", &tree, &[]).await.unwrap(), Redirect::Unchanged);
    }

    #[tokio::test]
    async fn test_redirect_absolute_paths_with_extensions() {
        let temp = TempDir::new().unwrap();
        let (pkg, tree) = package(
            &temp,
            r#"{"browser": {"./lib/node.js": "./lib/web.js", "./lib/server.js": false}}"#,
        )
        .await;
        let root = temp.path();
        let exts = vec!["js".to_string()];

        let redirected = pkg
            .redirect_require(&root.join("lib/node").to_string_lossy(), &tree, &exts)
            .await
            .unwrap();
        assert_eq!(
            redirected,
            Redirect::To(root.join("lib/web.js").to_string_lossy().into_owned())
        );

        let disabled = pkg
            .redirect_require(&root.join("lib/server.js").to_string_lossy(), &tree, &exts)
            .await
            .unwrap();
        assert_eq!(disabled, Redirect::Disabled);
    }

    #[tokio::test]
    async fn test_relative_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        let (pkg, tree) = package(&temp, "{}").await;
        let err = pkg.redirect_require("./x", &tree, &[]).await.unwrap_err();
        assert!(matches!(err, GraphError::RelativePath(_)));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let temp = TempDir::new().unwrap();
        let (pkg, tree) = package(&temp, "{ nope").await;
        let err = pkg.read(&tree).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidPackageJson { .. }));
    }

    #[tokio::test]
    async fn test_name_is_cached() {
        let temp = TempDir::new().unwrap();
        let (pkg, tree) = package(&temp, r#"{"name": "left-pad"}"#).await;
        let cache = FactCache::new(Arc::new(TestRuntime::new(temp.path().to_path_buf())));

        assert_eq!(pkg.name(&tree, &cache).await.unwrap().as_deref(), Some("left-pad"));
        assert_eq!(pkg.name(&tree, &cache).await.unwrap().as_deref(), Some("left-pad"));
        assert_eq!(cache.len(), 1);
    }
}
