//! Global-name lookups.

use std::path::Path;
use std::sync::Arc;

use super::ResolutionRequest;
use crate::error::{GraphError, Result};
use crate::haste_map::HasteEntry;
use crate::helpers::is_module_name;
use crate::module::Module;

impl ResolutionRequest<'_> {
    /// Resolve a bare name through the global map: a module providing the
    /// name, or a file inside a named package (`pkg/lib/util`).
    pub(super) async fn resolve_haste(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        if !is_module_name(name) {
            return Err(GraphError::unable_to_resolve(name, from.path(), "not a module name"));
        }

        let prefer_native = self.ctx.config.prefer_native_platform;

        // Clone out of the lock before awaiting.
        let (direct, package) = {
            let haste = self.ctx.haste.read();
            let direct = match haste.get(name, self.platform(), prefer_native) {
                Some(HasteEntry::Module(module)) => Some(module.path().to_path_buf()),
                _ => None,
            };

            let mut package = None;
            let mut candidate = Some(Path::new(name));
            while let Some(prefix) = candidate.filter(|p| !p.as_os_str().is_empty()) {
                let prefix_name = prefix.to_string_lossy();
                if let Some(HasteEntry::Package(found)) =
                    haste.get(&prefix_name, self.platform(), prefer_native)
                {
                    package = Some((prefix_name.into_owned(), found.clone()));
                    break;
                }
                candidate = prefix.parent();
            }
            (direct, package)
        };

        if let Some(path) = direct {
            return Ok(self.ctx.modules.get_module(&path));
        }

        let Some((package_name, package)) = package else {
            return Err(GraphError::unable_to_resolve(
                name,
                from.path(),
                "no module or package provides this name",
            ));
        };

        let found = if package_name == name {
            self.load_as_dir(&package.root).await
        } else {
            let rest = name[package_name.len()..].trim_start_matches('/');
            let path = package.root.join(rest);
            match self.load_as_file(&path).await {
                Err(e) if e.is_unable_to_resolve() => self.load_as_dir(&path).await,
                other => other,
            }
        };

        found.map_err(|e| {
            if e.is_unable_to_resolve() {
                GraphError::unable_to_resolve(
                    name,
                    from.path(),
                    format!("not found in package {}", package.root.display()),
                )
            } else {
                e
            }
        })
    }
}
