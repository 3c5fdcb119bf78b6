//! Filesystem and `node_modules` lookups.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;

use super::ResolutionRequest;
use crate::error::{GraphError, Result};
use crate::helpers::{extension, is_module_name, is_node_builtin};
use crate::module::Module;
use crate::platform::NATIVE_PLATFORM;

const NODE_MODULES: &str = "node_modules";

impl ResolutionRequest<'_> {
    pub(super) async fn resolve_node(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        let candidates: Vec<PathBuf> = if name.starts_with('.') {
            vec![Self::from_dir(from).join(name).clean()]
        } else if Path::new(name).is_absolute() {
            vec![PathBuf::from(name).clean()]
        } else {
            self.ctx
                .tree
                .roots()
                .iter()
                .map(|root| root.path.join(name).clean())
                .collect()
        };

        for candidate in &candidates {
            match self.load(candidate).await {
                Err(e) if e.is_unable_to_resolve() => {}
                other => return other,
            }
        }

        if !is_module_name(name) {
            return Err(GraphError::unable_to_resolve(
                name,
                from.path(),
                "no file or directory at this path",
            ));
        }

        match self.find_installed_module(from, name).await {
            Err(e) if e.is_unable_to_resolve() && is_node_builtin(name) => {
                Ok(self.ctx.modules.get_null_module(Path::new(name)))
            }
            other => other,
        }
    }

    async fn load(&self, path: &Path) -> Result<Arc<Module>> {
        match self.load_as_file(path).await {
            Err(e) if e.is_unable_to_resolve() => self.load_as_dir(path).await,
            other => other,
        }
    }

    /// Walk up from the requiring file through each `node_modules`
    /// directory.
    async fn find_installed_module(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        let mut dir = from.path().parent();
        while let Some(current) = dir {
            dir = current.parent();
            if current.file_name().is_some_and(|n| n == NODE_MODULES) {
                continue;
            }
            let candidate = current.join(NODE_MODULES).join(name);
            match self.load(&candidate).await {
                Err(e) if e.is_unable_to_resolve() => {}
                other => return other,
            }
        }

        Err(GraphError::unable_to_resolve(
            name,
            from.path(),
            "not found in any node_modules directory",
        ))
    }

    pub(super) async fn load_as_file(&self, path: &Path) -> Result<Arc<Module>> {
        let Some(file) = self.resolve_file_path(path) else {
            return Err(GraphError::unable_to_resolve(
                path.to_string_lossy(),
                path,
                "file does not exist",
            ));
        };

        Ok(if self.ctx.helpers.is_asset_file(&file) {
            self.ctx
                .modules
                .get_asset_module(&file, &self.ctx.config.platforms)
        } else {
            self.ctx.modules.get_module(&file)
        })
    }

    /// A directory resolves to its package's main module, or `index`.
    pub(super) async fn load_as_dir(&self, dir: &Path) -> Result<Arc<Module>> {
        if !self.ctx.tree.dir_exists(dir) {
            return Err(GraphError::unable_to_resolve(
                dir.to_string_lossy(),
                dir,
                "directory does not exist",
            ));
        }

        let manifest = dir.join("package.json");
        let main = if self.ctx.tree.file_exists(&manifest) {
            self.ctx.modules.get_package(&manifest).main(&self.ctx.tree).await?
        } else {
            dir.join("index")
        };

        self.load_as_file(&main).await
    }

    /// First existing file among the platform variants of `path`.
    ///
    /// A path that already carries a known extension only gets its
    /// platform variants tried. Otherwise each configured extension is
    /// appended in order.
    fn resolve_file_path(&self, path: &Path) -> Option<PathBuf> {
        let config = &self.ctx.config;
        let known = extension(path).filter(|ext| {
            config.extensions.iter().chain(&config.asset_extensions).any(|e| e == ext)
        });

        if let Some(ext) = known {
            let base = path.with_extension("");
            return self.first_variant(&base, ext);
        }

        config
            .extensions
            .iter()
            .find_map(|ext| self.first_variant(path, ext))
            .or_else(|| self.ctx.tree.file_exists(path).then(|| path.to_path_buf()))
    }

    fn first_variant(&self, base: &Path, ext: &str) -> Option<PathBuf> {
        let mut suffixes = Vec::with_capacity(3);
        if let Some(platform) = self.platform() {
            suffixes.push(format!(".{platform}.{ext}"));
        }
        if self.ctx.config.prefer_native_platform {
            suffixes.push(format!(".{NATIVE_PLATFORM}.{ext}"));
        }
        suffixes.push(format!(".{ext}"));

        suffixes.into_iter().find_map(|suffix| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);
            self.ctx.tree.file_exists(&candidate).then_some(candidate)
        })
    }
}
