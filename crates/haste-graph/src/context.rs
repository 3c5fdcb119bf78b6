//! Shared state of one dependency graph.

use haste_config::GraphConfig;
use parking_lot::RwLock;
use path_clean::PathClean;
use std::path::Path;
use std::sync::Arc;

use crate::asset::AssetResolver;
use crate::cache::FactCache;
use crate::error::Result;
use crate::fs::{FileTree, IgnorePredicate, Root};
use crate::haste_map::HasteMap;
use crate::helpers::PathHelpers;
use crate::module::ModuleIndex;
use crate::platform::Blacklist;
use crate::runtime::Runtime;
use crate::transform::Transformer;

/// Everything the resolver, walker and change pipeline share.
///
/// Readers go through `&GraphContext` freely; mutation of the tree, index
/// and global map only happens from the graph's serialized apply loop.
#[derive(Debug)]
pub struct GraphContext {
    pub config: Arc<GraphConfig>,
    pub runtime: Arc<dyn Runtime>,
    pub tree: FileTree,
    pub cache: FactCache,
    pub modules: ModuleIndex,
    pub helpers: PathHelpers,
    pub blacklist: Arc<Blacklist>,
    pub transformer: Option<Arc<dyn Transformer>>,
    pub assets: Arc<dyn AssetResolver>,
    pub haste: RwLock<HasteMap>,
}

impl GraphContext {
    pub fn new(
        config: Arc<GraphConfig>,
        runtime: Arc<dyn Runtime>,
        transformer: Option<Arc<dyn Transformer>>,
        assets: Arc<dyn AssetResolver>,
    ) -> Result<Self> {
        let blacklist = Arc::new(Blacklist::new(&config.blacklist, &config.platforms)?);

        let roots = config
            .roots
            .iter()
            .map(|root| Root::watched(root.clean()))
            .chain(config.detached_roots.iter().map(|root| Root::detached(root.clean())))
            .collect();

        let tree = FileTree::new(runtime.clone(), roots, ignore_predicate(&blacklist));

        Ok(Self {
            helpers: PathHelpers::new(
                config.provides_module_node_modules.clone(),
                config.asset_extensions.clone(),
            ),
            cache: FactCache::new(runtime.clone()),
            modules: ModuleIndex::new(),
            haste: RwLock::new(HasteMap::default()),
            tree,
            blacklist,
            transformer,
            assets,
            runtime,
            config,
        })
    }

    /// Source and asset extensions plus `json` for package manifests.
    pub fn tracked_extensions(&self) -> Vec<String> {
        let mut extensions = self.config.extensions.clone();
        let manifest = String::from("json");
        for ext in self.config.asset_extensions.iter().chain([&manifest]) {
            if !extensions.contains(ext) {
                extensions.push(ext.clone());
            }
        }
        extensions
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        let is_manifest = path.file_name().is_some_and(|n| n == crate::helpers::PACKAGE_JSON);
        is_manifest
            || crate::helpers::extension(path)
                .is_some_and(|ext| self.tracked_extensions().iter().any(|e| e == ext))
    }
}

/// Tree/crawl filter built from the global blacklist.
pub fn ignore_predicate(blacklist: &Arc<Blacklist>) -> IgnorePredicate {
    let blacklist = blacklist.clone();
    Arc::new(move |path: &Path| blacklist.is_ignored(path))
}
