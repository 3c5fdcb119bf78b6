//! Path classification shared by the module index, global map and resolver.

use std::path::Path;

/// Package manifest file name.
pub const PACKAGE_JSON: &str = "package.json";

const NODE_MODULES: &str = "node_modules";

/// Names of Node's standard library modules. Requiring one of these with no
/// installed package of the same name yields an empty module.
pub const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "console", "constants", "crypto", "dgram",
    "dns", "domain", "events", "fs", "http", "https", "module", "net", "os", "path", "process",
    "punycode", "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers",
    "tls", "tty", "url", "util", "vm", "zlib",
];

#[derive(Debug, Clone)]
pub struct PathHelpers {
    provides_module_node_modules: Vec<String>,
    asset_extensions: Vec<String>,
}

impl PathHelpers {
    pub fn new(provides_module_node_modules: Vec<String>, asset_extensions: Vec<String>) -> Self {
        Self {
            provides_module_node_modules,
            asset_extensions,
        }
    }

    /// True when `path` lives under `node_modules` in a package that is not
    /// allowed to declare global names.
    pub fn is_node_modules_dir(&self, path: &Path) -> bool {
        let components: Vec<&str> = path
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        let Some(position) = components.iter().rposition(|c| *c == NODE_MODULES) else {
            return false;
        };

        let rest = &components[position + 1..];
        !self
            .provides_module_node_modules
            .iter()
            .any(|allowed| rest.contains(&allowed.as_str()))
    }

    pub fn is_asset_file(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.asset_extensions.iter().any(|a| a == ext))
    }
}

/// Extension without the leading dot.
pub fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Any path segment is `node_modules`.
pub fn in_node_modules(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == NODE_MODULES)
}

/// A bare module name: not relative and not absolute.
pub fn is_module_name(name: &str) -> bool {
    !(name.starts_with('.') || name.starts_with('/') || Path::new(name).is_absolute())
}

pub fn is_node_builtin(name: &str) -> bool {
    NODE_BUILTINS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helpers() -> PathHelpers {
        PathHelpers::new(
            vec!["react-native".to_string()],
            vec!["png".to_string(), "jpg".to_string()],
        )
    }

    #[test]
    fn test_node_modules_dir() {
        let helpers = helpers();
        assert!(helpers.is_node_modules_dir(Path::new("/proj/node_modules/lodash/index.js")));
        assert!(!helpers.is_node_modules_dir(Path::new(
            "/proj/node_modules/react-native/Libraries/View.js"
        )));
        assert!(!helpers.is_node_modules_dir(Path::new("/proj/src/index.js")));
        // The innermost node_modules segment decides
        assert!(helpers.is_node_modules_dir(Path::new(
            "/proj/node_modules/react-native/node_modules/fbjs/a.js"
        )));
    }

    #[test]
    fn test_asset_file() {
        let helpers = helpers();
        assert!(helpers.is_asset_file(Path::new("/proj/icon@2x.png")));
        assert!(!helpers.is_asset_file(Path::new("/proj/index.js")));
    }

    #[test]
    fn test_module_name() {
        assert!(is_module_name("react"));
        assert!(is_module_name("react/lib/foo"));
        assert!(!is_module_name("./foo"));
        assert!(!is_module_name("../foo"));
        assert!(!is_module_name("/abs/foo"));
    }

    #[test]
    fn test_builtins() {
        assert!(is_node_builtin("fs"));
        assert!(!is_node_builtin("react"));
    }
}
