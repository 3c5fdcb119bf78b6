//! Finalized output of a dependency walk.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::module::Module;

/// A required name and the module it resolved to. `None` marks an omitted
/// edge (the name could not be resolved and the error was swallowed).
#[derive(Debug, Clone)]
pub struct ResolvedPair {
    pub name: String,
    pub module: Option<Arc<Module>>,
}

/// Ordered dependency list of an entry module, with the resolved edges of
/// every visited module.
///
/// Built with a [`ResponseBuilder`] and read-only afterwards. Splicing in
/// extra modules produces a copy.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResponse {
    platform: Option<String>,
    dependencies: Vec<Arc<Module>>,
    num_prepended: usize,
    resolved_pairs: IndexMap<String, Vec<ResolvedPair>>,
    mocks: IndexMap<String, PathBuf>,
    async_dependencies: Vec<Vec<PathBuf>>,
}

impl ResolutionResponse {
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Prepended modules first, then the entry, then everything it reaches.
    pub fn dependencies(&self) -> &[Arc<Module>] {
        &self.dependencies
    }

    /// The entry module, after any prepended modules.
    pub fn entry(&self) -> Option<&Arc<Module>> {
        self.dependencies.get(self.num_prepended)
    }

    pub fn num_prepended(&self) -> usize {
        self.num_prepended
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.dependencies.iter().map(|m| m.path()).collect()
    }

    pub fn module(&self, path: &Path) -> Option<&Arc<Module>> {
        self.dependencies.iter().find(|m| m.path() == path)
    }

    /// Resolved edges of `module`, in the order they are required.
    pub fn resolved_dependency_pairs(&self, module: &Module) -> &[ResolvedPair] {
        self.resolved_pairs
            .get(&module.hash())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Mock name to mock file, when mocks are enabled.
    pub fn mocks(&self) -> &IndexMap<String, PathBuf> {
        &self.mocks
    }

    /// Async bundles of the visited modules, as resolved file paths.
    pub fn async_dependencies(&self) -> &[Vec<PathBuf>] {
        &self.async_dependencies
    }

    /// Copy with `modules` placed ahead of the current list and counted as
    /// prepended.
    pub fn copy_with_prepended(&self, modules: Vec<Arc<Module>>) -> Self {
        let num_prepended = self.num_prepended + modules.len();
        let mut dependencies = modules;
        dependencies.extend(self.dependencies.iter().cloned());
        Self {
            dependencies,
            num_prepended,
            ..self.clone()
        }
    }

    /// Copy with the dependency list replaced.
    pub fn copy_with_dependencies(&self, dependencies: Vec<Arc<Module>>) -> Self {
        Self {
            num_prepended: self.num_prepended.min(dependencies.len()),
            dependencies,
            ..self.clone()
        }
    }
}

/// Mutable side of a [`ResolutionResponse`].
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    response: ResolutionResponse,
}

impl ResponseBuilder {
    pub fn new(platform: Option<&str>) -> Self {
        Self {
            response: ResolutionResponse {
                platform: platform.map(str::to_string),
                ..ResolutionResponse::default()
            },
        }
    }

    pub fn push_dependency(&mut self, module: Arc<Module>) {
        self.response.dependencies.push(module);
    }

    /// Insert ahead of everything pushed so far.
    pub fn prepend_dependency(&mut self, module: Arc<Module>) {
        self.response.dependencies.insert(0, module);
        self.response.num_prepended += 1;
    }

    pub fn set_resolved_pairs(&mut self, module: &Module, pairs: Vec<ResolvedPair>) {
        self.response.resolved_pairs.insert(module.hash(), pairs);
    }

    pub fn set_mocks(&mut self, mocks: IndexMap<String, PathBuf>) {
        self.response.mocks = mocks;
    }

    pub fn push_async_dependency(&mut self, bundle: Vec<PathBuf>) {
        self.response.async_dependencies.push(bundle);
    }

    pub fn len(&self) -> usize {
        self.response.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.response.dependencies.is_empty()
    }

    pub fn finalize(self) -> ResolutionResponse {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleId, ModuleKind};

    fn module(id: u32, path: &str) -> Arc<Module> {
        Arc::new(Module::new(ModuleId(id), PathBuf::from(path), ModuleKind::Source, 0))
    }

    #[test]
    fn test_entry_skips_prepended() {
        let mut builder = ResponseBuilder::new(Some("ios"));
        builder.push_dependency(module(0, "/p/a.js"));
        builder.push_dependency(module(1, "/p/b.js"));
        builder.prepend_dependency(module(2, "/p/polyfill.js"));

        let response = builder.finalize();
        assert_eq!(response.num_prepended(), 1);
        assert_eq!(response.entry().map(|m| m.path()), Some(Path::new("/p/a.js")));
        assert_eq!(
            response.paths(),
            vec![Path::new("/p/polyfill.js"), Path::new("/p/a.js"), Path::new("/p/b.js")]
        );
        assert_eq!(response.platform(), Some("ios"));
    }

    #[test]
    fn test_copy_with_prepended_keeps_original() {
        let mut builder = ResponseBuilder::new(None);
        builder.push_dependency(module(0, "/p/a.js"));
        let response = builder.finalize();

        let copy = response.copy_with_prepended(vec![module(1, "/p/x.js"), module(2, "/p/y.js")]);
        assert_eq!(copy.num_prepended(), 2);
        assert_eq!(copy.dependencies().len(), 3);
        assert_eq!(copy.entry().map(|m| m.path()), Some(Path::new("/p/a.js")));
        assert_eq!(response.dependencies().len(), 1);
    }

    #[test]
    fn test_copy_with_dependencies_replaces_list() {
        let a = module(0, "/p/a.js");
        let mut builder = ResponseBuilder::new(Some("android"));
        builder.push_dependency(a.clone());
        builder.push_dependency(module(1, "/p/b.js"));
        builder.prepend_dependency(module(2, "/p/polyfill.js"));
        builder.set_resolved_pairs(
            &a,
            vec![ResolvedPair {
                name: "./b".into(),
                module: None,
            }],
        );
        let response = builder.finalize();

        let copy = response.copy_with_dependencies(vec![module(3, "/p/c.js"), a.clone()]);
        assert_eq!(copy.paths(), vec![Path::new("/p/c.js"), Path::new("/p/a.js")]);
        assert_eq!(copy.num_prepended(), 1);
        assert_eq!(copy.entry().map(|m| m.path()), Some(Path::new("/p/a.js")));
        assert_eq!(copy.platform(), Some("android"));
        assert_eq!(copy.resolved_dependency_pairs(&a).len(), 1);
        assert_eq!(response.dependencies().len(), 3);

        let emptied = response.copy_with_dependencies(Vec::new());
        assert_eq!(emptied.num_prepended(), 0);
        assert!(emptied.entry().is_none());
    }

    #[test]
    fn test_resolved_pairs_by_module() {
        let a = module(0, "/p/a.js");
        let b = module(1, "/p/b.js");
        let mut builder = ResponseBuilder::new(None);
        builder.set_resolved_pairs(
            &a,
            vec![
                ResolvedPair {
                    name: "./b".into(),
                    module: Some(b.clone()),
                },
                ResolvedPair {
                    name: "missing".into(),
                    module: None,
                },
            ],
        );

        let response = builder.finalize();
        let pairs = response.resolved_dependency_pairs(&a);
        assert_eq!(pairs.len(), 2);
        assert!(pairs[1].module.is_none());
        assert!(response.resolved_dependency_pairs(&b).is_empty());
    }
}
