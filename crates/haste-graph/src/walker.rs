//! Transitive closure over the resolver.
//!
//! The walk is depth-first pre-order. All names of one module are resolved
//! concurrently and kept in declaration order; the targets that were not
//! seen before are then visited in that same order, before the siblings of
//! the module. Modules are de-duplicated by [`Module::hash`], which also ends
//! cycles.

use futures::future::join_all;
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::module::{Module, ModuleKind};
use crate::resolver::ResolutionRequest;
use crate::response::{ResolutionResponse, ResolvedPair, ResponseBuilder};
use crate::transform::TransformOptions;

/// Callback receiving each swallowed resolution error.
pub type ErrorCallback = Arc<dyn Fn(&GraphError) + Send + Sync>;

/// Mock files by name: `__mocks__/Foo.js` is the mock of `Foo`.
#[derive(Debug, Clone, Default)]
pub struct MockTable {
    by_name: IndexMap<String, PathBuf>,
}

impl MockTable {
    /// Collect every tracked file matching `pattern`, keyed by its file stem.
    /// The first file wins for a repeated stem.
    pub fn collect(ctx: &GraphContext, pattern: &Regex) -> Self {
        let mut by_name = IndexMap::new();
        for path in ctx.tree.files_matching(pattern) {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            by_name.entry(stem).or_insert(path);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn to_map(&self) -> IndexMap<String, PathBuf> {
        self.by_name.clone()
    }
}

#[derive(Clone, Default)]
pub struct WalkOptions {
    pub transform: TransformOptions,
    /// Follow dependencies past the entry's direct ones.
    pub recursive: bool,
    /// Abort on the first resolution error instead of omitting the edge.
    pub escalate: bool,
    pub on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkOptions")
            .field("transform", &self.transform)
            .field("recursive", &self.recursive)
            .field("escalate", &self.escalate)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct GraphWalker<'a> {
    ctx: &'a GraphContext,
    request: ResolutionRequest<'a>,
    options: WalkOptions,
    mocks: Option<MockTable>,
}

impl<'a> GraphWalker<'a> {
    pub fn new(ctx: &'a GraphContext, options: WalkOptions, mocks: Option<MockTable>) -> Self {
        Self {
            request: ResolutionRequest::new(ctx, options.transform.platform.as_deref()),
            ctx,
            options,
            mocks,
        }
    }

    pub async fn walk(&self, entry: Arc<Module>) -> Result<ResolutionResponse> {
        let start = Instant::now();
        let mut builder = ResponseBuilder::new(self.request.platform());
        if let Some(mocks) = &self.mocks {
            builder.set_mocks(mocks.to_map());
        }

        let mut visited = FxHashSet::default();
        let mut visit_order = Vec::new();

        if self.options.recursive {
            let mut stack = vec![entry.clone()];
            while let Some(module) = stack.pop() {
                if !visited.insert(module.hash()) {
                    continue;
                }
                builder.push_dependency(module.clone());
                visit_order.push(module.clone());

                let targets = self.resolve_module(&module, &mut builder).await?;
                stack.extend(
                    targets
                        .into_iter()
                        .rev()
                        .filter(|target| !visited.contains(&target.hash())),
                );
            }
        } else {
            visited.insert(entry.hash());
            builder.push_dependency(entry.clone());
            visit_order.push(entry.clone());
            for target in self.resolve_module(&entry, &mut builder).await? {
                if visited.insert(target.hash()) {
                    builder.push_dependency(target);
                }
            }
        }

        for module in &visit_order {
            for bundle in self.resolve_async_bundles(module).await? {
                builder.push_async_dependency(bundle);
            }
        }

        tracing::debug!(
            entry = %entry.path().display(),
            modules = builder.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "walked dependencies"
        );
        Ok(builder.finalize())
    }

    /// Resolve every name `module` requires, record the pairs, and return
    /// the resolved targets in declaration order. Mocks of the module come
    /// last.
    async fn resolve_module(
        &self,
        module: &Arc<Module>,
        builder: &mut ResponseBuilder,
    ) -> Result<Vec<Arc<Module>>> {
        let names = module.dependencies(self.ctx, &self.options.transform).await?;
        let mocked = self.mocks_of(module, &names).await?;

        let results = join_all(names.iter().map(|name| self.resolve_name(module, name))).await;

        let mut pairs = Vec::with_capacity(names.len() + mocked.len());
        let mut targets = Vec::with_capacity(names.len() + mocked.len());
        for (name, result) in names.into_iter().zip(results) {
            let resolved = self.recover(result)?;
            if let Some(target) = &resolved {
                targets.push(target.clone());
            }
            pairs.push(ResolvedPair {
                name,
                module: resolved,
            });
        }

        for (name, path) in mocked {
            let mock = self.ctx.modules.get_module(&path);
            targets.push(mock.clone());
            pairs.push(ResolvedPair {
                name,
                module: Some(mock),
            });
        }

        builder.set_resolved_pairs(module, pairs);
        Ok(targets)
    }

    /// Mock files registered under the module's name or its package's
    /// name, unless the module already requires that name.
    async fn mocks_of(&self, module: &Module, names: &[String]) -> Result<Vec<(String, PathBuf)>> {
        let Some(mocks) = self.mocks.as_ref().filter(|m| !m.is_empty()) else {
            return Ok(Vec::new());
        };
        if !matches!(module.kind(), ModuleKind::Source) {
            return Ok(Vec::new());
        }

        let mut candidates = vec![module.name(self.ctx).await?];
        if let Some(package) = module.package(self.ctx) {
            match package.name(&self.ctx.tree, &self.ctx.cache).await {
                Ok(Some(name)) => candidates.push(name),
                Ok(None) | Err(GraphError::InvalidPackageJson { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut mocked = Vec::new();
        for name in candidates {
            let Some(path) = mocks.get(&name) else {
                continue;
            };
            if path != module.path() && !names.contains(&name) && !mocked.iter().any(|(n, _)| *n == name) {
                mocked.push((name, path.clone()));
            }
        }
        Ok(mocked)
    }

    async fn resolve_name(&self, from: &Module, name: &str) -> Result<Arc<Module>> {
        match self.request.resolve(from, name).await {
            Err(e) if e.is_unable_to_resolve() => match self.mocks.as_ref().and_then(|m| m.get(name)) {
                Some(mock) => Ok(self.ctx.modules.get_module(mock)),
                None => Err(e),
            },
            other => other,
        }
    }

    /// Swallow a resolution error unless escalation is on.
    fn recover(&self, result: Result<Arc<Module>>) -> Result<Option<Arc<Module>>> {
        match result {
            Ok(module) => Ok(Some(module)),
            Err(e) if e.is_unable_to_resolve() && !self.options.escalate => {
                tracing::warn!(error = %e, "omitting unresolved dependency");
                if let Some(on_error) = &self.options.on_error {
                    on_error(&e);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn resolve_async_bundles(&self, module: &Module) -> Result<Vec<Vec<PathBuf>>> {
        let bundles = module
            .async_dependencies(self.ctx, &self.options.transform)
            .await?;

        let mut resolved = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            let results = join_all(bundle.iter().map(|name| self.resolve_name(module, name))).await;
            let mut paths = Vec::with_capacity(results.len());
            for result in results {
                if let Some(target) = self.recover(result)? {
                    paths.push(target.path().to_path_buf());
                }
            }
            resolved.push(paths);
        }
        Ok(resolved)
    }
}
