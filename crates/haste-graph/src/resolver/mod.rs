//! Resolution of required names to modules.
//!
//! Steps, first match wins:
//!
//! 1. asset references (`image!logo`, absolute asset paths)
//! 2. package redirects (`browser` / `react-native` maps), then the global
//!    redirect table; a redirect to `false` yields a null module
//! 3. global names and named packages for bare names
//! 4. the filesystem, relative to the requiring file or the roots
//! 5. `node_modules` directories above the requiring file
//!
//! Every result is recorded as an edge on the requiring module, so the next
//! lookup of the same name for the same platform is a map hit.

mod haste;
mod node;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use haste_config::RedirectTarget;
use path_clean::PathClean;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::module::{EdgeKey, Module, Redirect};

/// Resolves names for one platform.
#[derive(Debug, Clone)]
pub struct ResolutionRequest<'a> {
    ctx: &'a GraphContext,
    platform: Option<String>,
}

impl<'a> ResolutionRequest<'a> {
    pub fn new(ctx: &'a GraphContext, platform: Option<&str>) -> Self {
        Self {
            ctx,
            platform: platform.map(str::to_string),
        }
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Resolve `name` as required from `from`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnableToResolve`] when nothing matches or the match is
    /// excluded for this platform. Other errors are I/O or malformed
    /// package manifests.
    pub async fn resolve(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        let key = EdgeKey::new(name, self.platform());
        if let Some(cached) = self.ctx.modules.dependency(from.id(), &key) {
            return Ok(cached);
        }

        let resolved = match self.resolve_asset(from, name) {
            Some(asset) => asset,
            None => self.resolve_js(from, name).await?,
        };

        if !resolved.is_null() && self.ctx.blacklist.is_excluded(resolved.path(), self.platform()) {
            return Err(GraphError::unable_to_resolve(
                name,
                from.path(),
                format!("{} is excluded for this platform", resolved.path().display()),
            ));
        }

        tracing::trace!(
            from = %from.path().display(),
            name,
            to = %resolved.path().display(),
            "resolved"
        );
        self.ctx.modules.set_dependency(from.id(), key, resolved.id());
        Ok(resolved)
    }

    fn from_dir(from: &Module) -> &Path {
        from.path().parent().unwrap_or(Path::new("/"))
    }

    fn absolutize(from: &Module, name: &str) -> PathBuf {
        if name.starts_with('.') {
            Self::from_dir(from).join(name).clean()
        } else {
            PathBuf::from(name)
        }
    }

    fn resolve_asset(&self, from: &Module, name: &str) -> Option<Arc<Module>> {
        let candidate = if name.starts_with('.') {
            Self::absolutize(from, name).to_string_lossy().into_owned()
        } else {
            name.to_string()
        };

        let path = self
            .ctx
            .assets
            .resolve_asset_path(&candidate, &self.ctx.tree, self.platform())?;
        Some(
            self.ctx
                .modules
                .get_asset_module(&path, &self.ctx.config.platforms),
        )
    }

    async fn resolve_js(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        let Some(mut target) = self.redirect_require(from, name).await? else {
            return Ok(self.null_module(from, name));
        };

        if let Some(redirect) = self.ctx.config.redirect.get(&target) {
            match redirect {
                RedirectTarget::Module(to) => target = to.clone(),
                RedirectTarget::Disabled(false) => return Ok(self.null_module(from, &target)),
                RedirectTarget::Disabled(true) => {}
            }
        }

        match self.resolve_haste(from, &target).await {
            Err(e) if e.is_unable_to_resolve() => self.resolve_node(from, &target).await,
            other => other,
        }
    }

    /// Apply the requiring module's package redirects. `None` means the name
    /// is disabled.
    async fn redirect_require(&self, from: &Module, name: &str) -> Result<Option<String>> {
        let Some(package) = from.package(self.ctx) else {
            return Ok(Some(name.to_string()));
        };

        let lookup = Self::absolutize(from, name).to_string_lossy().into_owned();
        let redirect = package
            .redirect_require(&lookup, &self.ctx.tree, &self.ctx.config.extensions)
            .await;

        match redirect {
            Ok(Redirect::Unchanged) => Ok(Some(name.to_string())),
            Ok(Redirect::Disabled) => Ok(None),
            Ok(Redirect::To(to)) if to == lookup => Ok(Some(name.to_string())),
            Ok(Redirect::To(to)) => Ok(Some(to)),
            Err(GraphError::InvalidPackageJson { path, reason }) => {
                tracing::warn!(path = %path.display(), %reason, "ignoring redirects of malformed package.json");
                Ok(Some(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn null_module(&self, from: &Module, name: &str) -> Arc<Module> {
        self.ctx
            .modules
            .get_null_module(&Self::absolutize(from, name))
    }
}
