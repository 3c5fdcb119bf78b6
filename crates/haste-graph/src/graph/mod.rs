//! The [`DependencyGraph`] facade.
//!
//! ```text
//!   load()  ── crawl ──▶ FileTree ──▶ snapshot restore ──▶ assets ──▶ HasteMap
//!                                                                      │
//!   watcher events ──▶ apply loop (single task) ───── patches ─────────┘
//!
//!   get_dependencies(entry) ──▶ GraphWalker ──▶ ResolutionRequest ──▶ ResolutionResponse
//! ```

mod changes;
mod debug;

use haste_config::{ConfigError, GraphConfig};
use parking_lot::Mutex;
use path_clean::PathClean;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OnceCell, mpsc, oneshot};

use crate::asset::{AssetResolver, AssetServer};
use crate::context::{GraphContext, ignore_predicate};
use crate::error::{GraphError, Result};
use crate::fs::{CrawlOptions, crawl};
use crate::haste_map::HasteMap;
use crate::module::Module;
use crate::platform::platform_extension;
use crate::response::ResolutionResponse;
use crate::runtime::{NativeRuntime, Runtime};
use crate::transform::{TransformOptions, Transformer};
use crate::walker::{ErrorCallback, GraphWalker, MockTable, WalkOptions};
use crate::watch::{FileWatcher, NotifyWatcher};

use changes::{Command, HasteFailure};

/// Decides, per entry and platform, whether swallowed resolution errors
/// should abort the walk instead.
pub type ThrowPredicate = Arc<dyn Fn(&Path, Option<&str>) -> bool + Send + Sync>;

/// Options of [`DependencyGraph::get_dependencies`].
#[derive(Clone)]
pub struct DependencyOptions {
    /// Target platform; inferred from the entry's suffix when `None`.
    pub platform: Option<String>,
    pub dev: bool,
    pub recursive: bool,
    pub on_error: Option<ErrorCallback>,
    pub should_throw: Option<ThrowPredicate>,
}

impl Default for DependencyOptions {
    fn default() -> Self {
        Self {
            platform: None,
            dev: true,
            recursive: true,
            on_error: None,
            should_throw: None,
        }
    }
}

impl fmt::Debug for DependencyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyOptions")
            .field("platform", &self.platform)
            .field("dev", &self.dev)
            .field("recursive", &self.recursive)
            .finish_non_exhaustive()
    }
}

impl DependencyOptions {
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn shallow(mut self) -> Self {
        self.recursive = false;
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&GraphError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn should_throw(
        mut self,
        predicate: impl Fn(&Path, Option<&str>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_throw = Some(Arc::new(predicate));
        self
    }
}

/// Builder for [`DependencyGraph`].
pub struct GraphBuilder {
    config: GraphConfig,
    runtime: Option<Arc<dyn Runtime>>,
    watcher: Option<Arc<dyn FileWatcher>>,
    transformer: Option<Arc<dyn Transformer>>,
    assets: Option<Arc<dyn AssetResolver>>,
}

impl GraphBuilder {
    /// Filesystem access; defaults to [`NativeRuntime`].
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Change source. Without one, a [`NotifyWatcher`] over the watched roots
    /// is started when `watch.enabled` is set.
    pub fn watcher(mut self, watcher: Arc<dyn FileWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Without a transformer, sources are used as-is.
    pub fn transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Asset resolution; defaults to an [`AssetServer`].
    pub fn asset_resolver(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn build(self) -> Result<DependencyGraph> {
        let mut config = self.config;
        let runtime = self.runtime.unwrap_or_else(|| Arc::new(NativeRuntime::new()));
        if config.roots.iter().chain(&config.detached_roots).any(|r| r.is_relative()) {
            let cwd = runtime.get_cwd()?;
            config.resolve_paths(Path::new(&cwd));
        }

        let mocks_pattern = config
            .mocks_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let assets = self.assets.unwrap_or_else(|| {
            Arc::new(AssetServer::new(
                config.asset_extensions.clone(),
                config.platforms.clone(),
            ))
        });

        let watcher = match self.watcher {
            Some(watcher) => Some(watcher),
            None if config.watch.enabled => {
                let roots = config.roots.iter().map(|root| root.clean()).collect();
                Some(Arc::new(NotifyWatcher::new(roots, &config.watch)?) as Arc<dyn FileWatcher>)
            }
            None => None,
        };

        let ctx = GraphContext::new(Arc::new(config), runtime, self.transformer, assets)?;
        Ok(DependencyGraph {
            ctx: Arc::new(ctx),
            watcher,
            mocks_pattern,
            loaded: OnceCell::new(),
            haste_failure: HasteFailure::default(),
            commands: Mutex::new(None),
        })
    }
}

/// Incrementally updated module graph over a set of roots.
pub struct DependencyGraph {
    ctx: Arc<GraphContext>,
    watcher: Option<Arc<dyn FileWatcher>>,
    mocks_pattern: Option<Regex>,
    loaded: OnceCell<Result<()>>,
    haste_failure: HasteFailure,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("roots", &self.ctx.config.roots)
            .field("loaded", &self.loaded.initialized())
            .field("modules", &self.ctx.modules.len())
            .finish_non_exhaustive()
    }
}

impl DependencyGraph {
    pub fn builder(config: GraphConfig) -> GraphBuilder {
        GraphBuilder {
            config,
            runtime: None,
            watcher: None,
            transformer: None,
            assets: None,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.ctx.config
    }

    /// Crawl the roots and build the global module map.
    ///
    /// Idempotent: concurrent and repeated calls share one load. Fails while
    /// the global module map is in a failed state (e.g. a name collision),
    /// until a later change fixes it.
    pub async fn load(&self) -> Result<()> {
        self.loaded
            .get_or_init(|| self.initialize())
            .await
            .clone()?;

        match &*self.haste_failure.lock() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn initialize(&self) -> Result<()> {
        let start = Instant::now();
        let ctx = &self.ctx;

        // Subscribe first so changes made during the crawl are not lost.
        let events = self.watcher.as_ref().map(|w| w.subscribe());

        let options = CrawlOptions::new(ctx.tracked_extensions())
            .with_ignore(ignore_predicate(&ctx.blacklist));
        let files = crawl(
            &ctx.tree.watched_roots(),
            &options,
            ctx.runtime.as_ref(),
            self.watcher.as_deref(),
        )
        .await?;
        let file_count = ctx.tree.build(files);

        let cache = &ctx.config.cache;
        if let Some(dir) = &cache.dir {
            if cache.reset {
                tracing::info!(dir = %dir.display(), "ignoring persisted cache");
            } else {
                let restored = ctx.cache.load_snapshot(dir, &cache.epoch).await;
                tracing::debug!(restored, "restored cached facts");
            }
        }

        ctx.assets.build(&ctx.tree);

        match HasteMap::build(ctx).await {
            Ok(map) => *ctx.haste.write() = map,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build global module map");
                *self.haste_failure.lock() = Some(e);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.commands.lock() = Some(tx);
        tokio::spawn(changes::apply_loop(
            ctx.clone(),
            events,
            rx,
            self.haste_failure.clone(),
        ));

        tracing::info!(
            files = file_count,
            global_names = ctx.haste.read().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dependency graph loaded"
        );
        Ok(())
    }

    /// Resolves once every change received so far has been applied.
    pub async fn settle(&self) -> Result<()> {
        let Some(commands) = self.commands.lock().clone() else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        commands
            .send(Command::Barrier(tx))
            .map_err(|_| GraphError::Watcher("change loop stopped".to_string()))?;
        rx.await
            .map_err(|_| GraphError::Watcher("change loop stopped".to_string()))
    }

    /// Ordered dependencies of `entry`, polyfills first.
    pub async fn get_dependencies(
        &self,
        entry: impl AsRef<Path>,
        options: DependencyOptions,
    ) -> Result<ResolutionResponse> {
        self.load().await?;

        let entry = self.entry_path(entry.as_ref())?;
        let platform = self.platform_for(&entry, options.platform.as_deref())?;
        let escalate = options
            .should_throw
            .as_ref()
            .is_some_and(|should_throw| should_throw(&entry, platform.as_deref()));

        let module = self.ctx.modules.get_module(&entry);
        let walker = GraphWalker::new(
            &self.ctx,
            WalkOptions {
                transform: TransformOptions {
                    platform,
                    dev: options.dev,
                },
                recursive: options.recursive,
                escalate,
                on_error: options.on_error,
            },
            self.mock_table(),
        );
        let response = walker.walk(module).await?;

        let polyfills = self.polyfills();
        Ok(if polyfills.is_empty() {
            response
        } else {
            response.copy_with_prepended(polyfills)
        })
    }

    /// Names `entry` requires, as written, unresolved.
    pub async fn get_shallow_dependencies(&self, entry: impl AsRef<Path>) -> Result<Vec<String>> {
        self.load().await?;
        let entry = self.entry_path(entry.as_ref())?;
        self.ctx
            .modules
            .get_module(&entry)
            .dependencies(&self.ctx, &TransformOptions::default())
            .await
    }

    /// Async bundles of `entry` resolved to file paths.
    pub async fn get_async_dependencies(
        &self,
        entry: impl AsRef<Path>,
        platform: Option<&str>,
    ) -> Result<Vec<Vec<PathBuf>>> {
        self.load().await?;
        let entry = self.entry_path(entry.as_ref())?;
        let platform = self.platform_for(&entry, platform)?;
        let walker = GraphWalker::new(
            &self.ctx,
            WalkOptions {
                transform: TransformOptions {
                    platform,
                    dev: true,
                },
                ..WalkOptions::default()
            },
            None,
        );
        walker
            .resolve_async_bundles(&self.ctx.modules.get_module(&entry))
            .await
    }

    /// Module handle for `path`; assets get an asset module.
    pub fn get_module_for_path(&self, path: impl AsRef<Path>) -> Result<Arc<Module>> {
        let path = path.as_ref();
        if path.is_relative() {
            return Err(GraphError::RelativePath(path.to_path_buf()));
        }
        let path = path.clean();
        Ok(if self.ctx.helpers.is_asset_file(&path) {
            self.ctx
                .modules
                .get_asset_module(&path, &self.ctx.config.platforms)
        } else {
            self.ctx.modules.get_module(&path)
        })
    }

    /// Every known file whose path matches `pattern`, sorted.
    pub async fn match_files_by_pattern(&self, pattern: &Regex) -> Result<Vec<PathBuf>> {
        self.load().await?;
        Ok(self.ctx.tree.files_matching(pattern))
    }

    /// `(name, platform, path)` for every global module name.
    pub fn global_names(&self) -> Vec<(String, String, PathBuf)> {
        self.ctx.haste.read().entries()
    }

    pub fn get_debug_info(&self) -> String {
        debug::render(&self.ctx)
    }

    /// Write the fact cache snapshot, if a cache directory is configured.
    pub async fn persist_cache(&self) -> Result<Option<PathBuf>> {
        let cache = &self.ctx.config.cache;
        let Some(dir) = &cache.dir else {
            return Ok(None);
        };
        let path = self.ctx.cache.persist(dir, &cache.epoch).await?;
        tracing::info!(path = %path.display(), facts = self.ctx.cache.len(), "persisted fact cache");
        Ok(Some(path))
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> &GraphContext {
        &self.ctx
    }

    /// Absolute entry path. Relative paths are tried against each root.
    fn entry_path(&self, entry: &Path) -> Result<PathBuf> {
        let candidates: Vec<PathBuf> = if entry.is_absolute() {
            vec![entry.clean()]
        } else {
            self.ctx
                .tree
                .roots()
                .iter()
                .map(|root| root.path.join(entry).clean())
                .collect()
        };

        candidates
            .into_iter()
            .find(|candidate| self.ctx.tree.file_exists(candidate))
            .ok_or_else(|| GraphError::EntryNotFound(entry.to_path_buf()))
    }

    fn platform_for(&self, entry: &Path, requested: Option<&str>) -> Result<Option<String>> {
        let config = &self.ctx.config;
        match requested {
            Some(platform) if !config.is_platform(platform) => Err(GraphError::UnrecognizedPlatform {
                platform: platform.to_string(),
                configured: config.platforms.clone(),
            }),
            Some(platform) => Ok(Some(platform.to_string())),
            None => Ok(platform_extension(entry, &config.platforms)
                .filter(|platform| config.is_platform(platform))
                .map(str::to_string)),
        }
    }

    fn mock_table(&self) -> Option<MockTable> {
        let pattern = self.mocks_pattern.as_ref()?;
        Some(MockTable::collect(&self.ctx, pattern))
    }

    /// Configured polyfills in order, each depending on the ones before it.
    fn polyfills(&self) -> Vec<Arc<Module>> {
        let mut ids: Vec<String> = Vec::new();
        self.ctx
            .config
            .polyfills
            .iter()
            .map(|path| {
                let id = path.to_string_lossy().into_owned();
                let polyfill = self.ctx.modules.get_polyfill(path, &id, ids.clone());
                ids.push(id);
                polyfill
            })
            .collect()
    }
}
