//! Modules and packages.
//!
//! A [`Module`] wraps one path and is a cheap handle: every fact about the
//! file (declared name, dependencies, transformed code) is computed on demand
//! through the [`FactCache`](crate::cache::FactCache) and memoized there. The
//! special kinds of module are variants of [`ModuleKind`] rather than
//! separate types, so the resolver and walker switch on the tag.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!   path ──▶ │ ModuleIndex (one slot / path)│──▶ Arc<Module { id, kind, generation }>
//!            └──────────────────────────────┘
//!                     │ facts (lazy)
//!                     ▼
//!            FactCache[(path, "id" | "isHaste" | "name" | "moduleData:<opts>")]
//! ```

pub mod docblock;
pub mod extract;
pub mod index;
pub mod package;

pub use docblock::DocBlock;
pub use index::{EdgeKey, ModuleIndex};
pub use package::{Package, PackageJson, Redirect};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::asset::AssetName;
use crate::context::GraphContext;
use crate::error::Result;
use crate::helpers::{PACKAGE_JSON, in_node_modules};
use crate::transform::{TransformError, TransformOptions};

/// Body served for [`ModuleKind::Null`] modules.
pub const NULL_MODULE_CODE: &str = "module.exports = null;";

/// Suffix appended to the path of a null module.
pub const NULL_MODULE_SUFFIX: &str = "_NULL";

/// Index of a module slot. Stable across invalidations of the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    Source,
    Json,
    Asset(AssetName),
    /// Injected ahead of the dependency list, never resolved.
    Polyfill {
        id: String,
        dependencies: Vec<String>,
    },
    /// Stand-in for a disabled or missing dependency.
    Null,
}

/// Everything derived from reading (and transforming) a module's source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    pub id: Option<String>,
    pub code: String,
    pub dependencies: Vec<String>,
    pub async_dependencies: Vec<Vec<String>>,
    pub map: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Module {
    id: ModuleId,
    path: PathBuf,
    kind: ModuleKind,
    generation: u32,
}

impl Module {
    pub(crate) fn new(id: ModuleId, path: PathBuf, kind: ModuleKind, generation: u32) -> Self {
        Self {
            id,
            path,
            kind,
            generation,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    /// Bumped each time a change event replaces the instance.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Stable identity used to de-duplicate the walk.
    pub fn hash(&self) -> String {
        let label = match self.kind {
            ModuleKind::Source | ModuleKind::Json => "Module",
            ModuleKind::Asset(_) => "AssetModule",
            ModuleKind::Polyfill { .. } => "Polyfill",
            ModuleKind::Null => "NullModule",
        };
        format!("{} : {}", label, self.path.display())
    }

    pub fn is_json(&self) -> bool {
        matches!(self.kind, ModuleKind::Json)
    }

    pub fn is_asset(&self) -> bool {
        matches!(self.kind, ModuleKind::Asset(_))
    }

    pub fn is_polyfill(&self) -> bool {
        matches!(self.kind, ModuleKind::Polyfill { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ModuleKind::Null)
    }

    fn has_source(&self) -> bool {
        matches!(self.kind, ModuleKind::Source | ModuleKind::Json)
    }

    /// Global name declared in the leading doc block, if any.
    ///
    /// Declarations inside `node_modules` are ignored unless the package is
    /// whitelisted.
    pub async fn declared_id(&self, ctx: &GraphContext) -> Result<Option<String>> {
        if !matches!(self.kind, ModuleKind::Source) {
            return Ok(None);
        }

        ctx.cache
            .get(&self.path, "id", || async {
                if ctx.helpers.is_node_modules_dir(&self.path) {
                    return Ok(None);
                }
                let head = ctx
                    .tree
                    .read_until(&self.path, Box::new(docblock::in_docblock))
                    .await?;
                Ok(DocBlock::parse(&head.content)
                    .provides_module()
                    .map(str::to_string))
            })
            .await
    }

    /// Nearest enclosing package.
    pub fn package(&self, ctx: &GraphContext) -> Option<Arc<Package>> {
        if !self.has_source() && !self.is_asset() {
            return None;
        }
        let manifest = ctx.tree.closest(&self.path, PACKAGE_JSON)?;
        Some(ctx.modules.get_package(&manifest))
    }

    /// Inside `node_modules`, only packages that are themselves roots may
    /// lend their name to their main module.
    fn is_haste_compatible(&self, ctx: &GraphContext, package: &Package) -> bool {
        if !in_node_modules(&self.path) {
            return true;
        }
        ctx.tree.roots().iter().any(|root| root.path == package.root)
    }

    pub async fn is_main(&self, ctx: &GraphContext) -> Result<bool> {
        let Some(package) = self.package(ctx) else {
            return Ok(false);
        };
        ctx.cache
            .get(&self.path, "isMain", || async {
                Ok(package.main(&ctx.tree).await? == self.path)
            })
            .await
    }

    /// Addressable by a global name: declared in the doc block, or the main
    /// module of a named package.
    pub async fn is_haste(&self, ctx: &GraphContext) -> Result<bool> {
        if !matches!(self.kind, ModuleKind::Source) {
            return Ok(false);
        }
        ctx.cache
            .get(&self.path, "isHaste", || async {
                if self.declared_id(ctx).await?.is_some() {
                    return Ok(true);
                }
                let Some(package) = self.package(ctx) else {
                    return Ok(false);
                };
                if !self.is_haste_compatible(ctx, &package) || !self.is_main(ctx).await? {
                    return Ok(false);
                }
                Ok(package.name(&ctx.tree, &ctx.cache).await?.is_some())
            })
            .await
    }

    /// Symbolic name: declared name, else the package name for a main
    /// module, else the path relative to its root.
    pub async fn name(&self, ctx: &GraphContext) -> Result<String> {
        match &self.kind {
            ModuleKind::Null => return Ok(self.path.to_string_lossy().into_owned()),
            ModuleKind::Polyfill { id, .. } => {
                let id_path = Path::new(id);
                return Ok(if id_path.is_absolute() {
                    self.relative_to_root(ctx, id_path)
                } else {
                    id.clone()
                });
            }
            ModuleKind::Asset(asset) => {
                let relative = self.relative_to_root(ctx, &self.path);
                return Ok(match relative.rsplit_once('/') {
                    Some((dir, _)) => format!("{dir}/{}", asset.asset_name),
                    None => asset.asset_name.clone(),
                });
            }
            ModuleKind::Source | ModuleKind::Json => {}
        }

        let name: Option<String> = ctx
            .cache
            .get(&self.path, "name", || async {
                if let Some(id) = self.declared_id(ctx).await? {
                    return Ok(Some(id));
                }
                let Some(package) = self.package(ctx) else {
                    return Ok(None);
                };
                if !self.is_haste_compatible(ctx, &package) || !self.is_main(ctx).await? {
                    return Ok(None);
                }
                package.name(&ctx.tree, &ctx.cache).await
            })
            .await?;

        Ok(name.unwrap_or_else(|| self.relative_to_root(ctx, &self.path)))
    }

    fn relative_to_root(&self, ctx: &GraphContext, path: &Path) -> String {
        ctx.tree
            .root_for(path)
            .and_then(|root| path.strip_prefix(&root.path).ok())
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Read, transform and extract dependencies. Memoized per transform
    /// options.
    pub async fn read(
        &self,
        ctx: &GraphContext,
        options: &TransformOptions,
    ) -> Result<Arc<ModuleData>> {
        if !self.has_source() {
            return Ok(Arc::new(ModuleData {
                code: if self.is_null() {
                    NULL_MODULE_CODE.to_string()
                } else {
                    String::new()
                },
                ..ModuleData::default()
            }));
        }

        let key = format!("moduleData:{}", options.cache_key());
        ctx.cache
            .get(&self.path, &key, || async {
                let source = ctx.tree.read_to_string(&self.path).await?;
                let id = self.declared_id(ctx).await?;

                // JSON and @extern modules are taken verbatim
                if self.is_json() || DocBlock::parse(&source).is_extern() {
                    return Ok(Arc::new(ModuleData {
                        id,
                        code: source,
                        ..ModuleData::default()
                    }));
                }

                let (code, dependencies, async_dependencies, map) = match &ctx.transformer {
                    Some(transformer) => {
                        let timeout = Duration::from_millis(ctx.config.transform_timeout_ms);
                        let output = tokio::time::timeout(
                            timeout,
                            transformer.transform(&source, &self.path, options),
                        )
                        .await
                        .map_err(|_| {
                            TransformError::new(
                                &self.path,
                                format!("transform timed out after {}ms", timeout.as_millis()),
                            )
                        })??;
                        (
                            output.code,
                            output.dependencies,
                            output.async_dependencies,
                            output.map,
                        )
                    }
                    None => (source, None, None, None),
                };

                let (dependencies, async_dependencies) = match (dependencies, async_dependencies) {
                    (Some(deps), Some(bundles)) => (deps, bundles),
                    (deps, bundles) => {
                        let extracted = extract::extract_requires(&code, &self.path);
                        (
                            deps.unwrap_or(extracted.sync),
                            bundles.unwrap_or(extracted.bundles),
                        )
                    }
                };

                tracing::debug!(
                    path = %self.path.display(),
                    dependencies = dependencies.len(),
                    "read module"
                );

                Ok(Arc::new(ModuleData {
                    id,
                    code,
                    dependencies,
                    async_dependencies,
                    map,
                }))
            })
            .await
    }

    /// Required names as written in the source, in order.
    pub async fn dependencies(
        &self,
        ctx: &GraphContext,
        options: &TransformOptions,
    ) -> Result<Vec<String>> {
        match &self.kind {
            ModuleKind::Polyfill { dependencies, .. } => Ok(dependencies.clone()),
            ModuleKind::Source | ModuleKind::Json => {
                Ok(self.read(ctx, options).await?.dependencies.clone())
            }
            ModuleKind::Asset(_) | ModuleKind::Null => Ok(Vec::new()),
        }
    }

    pub async fn async_dependencies(
        &self,
        ctx: &GraphContext,
        options: &TransformOptions,
    ) -> Result<Vec<Vec<String>>> {
        if !self.has_source() {
            return Ok(Vec::new());
        }
        Ok(self.read(ctx, options).await?.async_dependencies.clone())
    }

    pub async fn code(&self, ctx: &GraphContext, options: &TransformOptions) -> Result<String> {
        Ok(self.read(ctx, options).await?.code.clone())
    }
}

