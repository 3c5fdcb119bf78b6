//! Identity map of modules and packages.
//!
//! Each path owns one slot for the life of the graph. Edges between modules
//! are stored as slot ids, so replacing the module in a slot (a change event)
//! re-points every depender at the fresh instance without touching them.
//! A delete tombstones the slot and drops the edges that pointed into it.

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Module, ModuleId, ModuleKind, NULL_MODULE_SUFFIX, Package};
use crate::asset::AssetName;
use crate::helpers::extension;
use crate::watch::ChangeKind;

/// Key of a resolved edge: the name as written, per target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub name: String,
    pub platform: Option<String>,
}

impl EdgeKey {
    pub fn new(name: impl Into<String>, platform: Option<&str>) -> Self {
        Self {
            name: name.into(),
            platform: platform.map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    module: Option<Arc<Module>>,
    generation: u32,
    dependencies: IndexMap<EdgeKey, ModuleId>,
    dependers: IndexSet<(ModuleId, EdgeKey)>,
}

#[derive(Debug, Default)]
struct IndexInner {
    by_path: FxHashMap<PathBuf, ModuleId>,
    slots: Vec<Slot>,
    packages: FxHashMap<PathBuf, Arc<Package>>,
}

impl IndexInner {
    fn slot_for(&mut self, path: &Path) -> ModuleId {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }
        let id = ModuleId(self.slots.len() as u32);
        self.slots.push(Slot::default());
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    fn get_or_insert(&mut self, path: &Path, kind: impl FnOnce() -> ModuleKind) -> Arc<Module> {
        let id = self.slot_for(path);
        let slot = &mut self.slots[id.index()];
        if let Some(module) = &slot.module {
            return module.clone();
        }

        let module = Arc::new(Module::new(id, path.to_path_buf(), kind(), slot.generation));
        slot.module = Some(module.clone());
        module
    }

    fn unlink_dependencies(&mut self, id: ModuleId) {
        let outgoing = std::mem::take(&mut self.slots[id.index()].dependencies);
        for (key, target) in outgoing {
            self.slots[target.index()].dependers.shift_remove(&(id, key));
        }
    }

    fn unlink_dependers(&mut self, id: ModuleId) {
        let incoming = std::mem::take(&mut self.slots[id.index()].dependers);
        for (from, key) in incoming {
            self.slots[from.index()].dependencies.shift_remove(&key);
        }
    }
}

/// Graph-owned registry of [`Module`] and [`Package`] instances.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    inner: RwLock<IndexInner>,
}

fn source_kind(path: &Path) -> ModuleKind {
    if extension(path) == Some("json") {
        ModuleKind::Json
    } else {
        ModuleKind::Source
    }
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module for a source or JSON file.
    pub fn get_module(&self, path: &Path) -> Arc<Module> {
        let path = path.clean();
        if let Some(module) = self.get(&path) {
            return module;
        }
        self.inner
            .write()
            .get_or_insert(&path, || source_kind(&path))
    }

    pub fn get_asset_module<S: AsRef<str>>(&self, path: &Path, platforms: &[S]) -> Arc<Module> {
        let path = path.clean();
        self.inner.write().get_or_insert(&path, || {
            ModuleKind::Asset(AssetName::parse(&path, platforms))
        })
    }

    /// Null module standing in for `name_path` (`<path>_NULL`).
    pub fn get_null_module(&self, name_path: &Path) -> Arc<Module> {
        let mut path = name_path.as_os_str().to_owned();
        path.push(NULL_MODULE_SUFFIX);
        self.inner
            .write()
            .get_or_insert(Path::new(&path), || ModuleKind::Null)
    }

    pub fn get_polyfill(&self, path: &Path, id: &str, dependencies: Vec<String>) -> Arc<Module> {
        let path = path.clean();
        self.inner.write().get_or_insert(&path, || ModuleKind::Polyfill {
            id: id.to_string(),
            dependencies,
        })
    }

    /// Existing module at `path`, without creating one.
    pub fn get(&self, path: &Path) -> Option<Arc<Module>> {
        let inner = self.inner.read();
        let id = inner.by_path.get(path)?;
        inner.slots[id.index()].module.clone()
    }

    pub fn module(&self, id: ModuleId) -> Option<Arc<Module>> {
        self.inner.read().slots.get(id.index())?.module.clone()
    }

    pub fn get_package(&self, path: &Path) -> Arc<Package> {
        let path = path.clean();
        if let Some(package) = self.inner.read().packages.get(&path) {
            return package.clone();
        }
        self.inner
            .write()
            .packages
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Package::new(path)))
            .clone()
    }

    /// Cached resolution of `key` from `from`, if its target still exists.
    pub fn dependency(&self, from: ModuleId, key: &EdgeKey) -> Option<Arc<Module>> {
        let inner = self.inner.read();
        let target = inner.slots.get(from.index())?.dependencies.get(key)?;
        inner.slots[target.index()].module.clone()
    }

    /// Record the edge `from --key--> to`, replacing an earlier target.
    pub fn set_dependency(&self, from: ModuleId, key: EdgeKey, to: ModuleId) {
        let mut inner = self.inner.write();
        let previous = inner.slots[from.index()]
            .dependencies
            .insert(key.clone(), to);
        if let Some(previous) = previous.filter(|p| *p != to) {
            inner.slots[previous.index()]
                .dependers
                .shift_remove(&(from, key.clone()));
        }
        inner.slots[to.index()].dependers.insert((from, key));
    }

    /// Resolved edges of `id`, in the order they were first recorded.
    pub fn dependencies_of(&self, id: ModuleId) -> Vec<(EdgeKey, Arc<Module>)> {
        let inner = self.inner.read();
        let Some(slot) = inner.slots.get(id.index()) else {
            return Vec::new();
        };
        slot.dependencies
            .iter()
            .filter_map(|(key, target)| {
                let module = inner.slots[target.index()].module.clone()?;
                Some((key.clone(), module))
            })
            .collect()
    }

    /// Modules holding an edge into `id`.
    pub fn dependers_of(&self, id: ModuleId) -> Vec<(Arc<Module>, EdgeKey)> {
        let inner = self.inner.read();
        let Some(slot) = inner.slots.get(id.index()) else {
            return Vec::new();
        };
        slot.dependers
            .iter()
            .filter_map(|(from, key)| {
                let module = inner.slots[from.index()].module.clone()?;
                Some((module, key.clone()))
            })
            .collect()
    }

    /// Apply a file change.
    ///
    /// The module's own outgoing edges are dropped in every case. On delete
    /// the slot is emptied and edges pointing at it are removed; otherwise a
    /// new instance takes the slot and keeps its dependers. Returns `true`
    /// when a module or package was affected.
    pub fn process_file_change(&self, kind: ChangeKind, path: &Path) -> bool {
        let path = path.clean();
        let mut inner = self.inner.write();
        let mut touched = inner.packages.remove(&path).is_some();

        let Some(id) = inner.by_path.get(&path).copied() else {
            return touched;
        };
        let Some(old) = inner.slots[id.index()].module.clone() else {
            return touched;
        };
        touched = true;

        inner.unlink_dependencies(id);

        if kind == ChangeKind::Delete {
            inner.unlink_dependers(id);
            let slot = &mut inner.slots[id.index()];
            slot.module = None;
            slot.generation += 1;
            tracing::debug!(path = %path.display(), "removed module");
            return touched;
        }

        let slot = &mut inner.slots[id.index()];
        slot.generation += 1;
        let kind = match old.kind() {
            ModuleKind::Source | ModuleKind::Json => source_kind(&path),
            other => other.clone(),
        };
        slot.module = Some(Arc::new(Module::new(id, path.clone(), kind, slot.generation)));
        tracing::debug!(
            path = %path.display(),
            generation = slot.generation,
            dependers = slot.dependers.len(),
            "replaced module"
        );
        touched
    }

    /// Forget every resolved edge while keeping module instances.
    ///
    /// Used when a change can make an existing name resolve elsewhere (a new
    /// platform variant, a nearer `node_modules` package, a new global name).
    /// Returns the number of edges dropped.
    pub fn clear_edges(&self) -> usize {
        let mut inner = self.inner.write();
        let mut dropped = 0;
        for slot in &mut inner.slots {
            dropped += slot.dependencies.len();
            slot.dependencies.clear();
            slot.dependers.clear();
        }
        dropped
    }

    /// Every live module, sorted by path.
    pub fn all_modules(&self) -> Vec<Arc<Module>> {
        let mut modules: Vec<Arc<Module>> = self
            .inner
            .read()
            .slots
            .iter()
            .filter_map(|slot| slot.module.clone())
            .collect();
        modules.sort_by(|a, b| a.path().cmp(b.path()));
        modules
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .slots
            .iter()
            .filter(|slot| slot.module.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every module, package and edge.
    pub fn refresh(&self) {
        tracing::info!("refreshing the module index");
        *self.inner.write() = IndexInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(name: &str) -> EdgeKey {
        EdgeKey::new(name, None)
    }

    #[test]
    fn test_one_instance_per_path() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let again = index.get_module(Path::new("/proj/./a.js"));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(index.len(), 1);

        let json = index.get_module(Path::new("/proj/data.json"));
        assert!(json.is_json());
    }

    #[test]
    fn test_null_module_path() {
        let index = ModuleIndex::new();
        let null = index.get_null_module(Path::new("fs"));
        assert!(null.is_null());
        assert_eq!(null.path(), Path::new("fs_NULL"));
        assert!(Arc::ptr_eq(&null, &index.get_null_module(Path::new("fs"))));
    }

    #[test]
    fn test_change_repoints_dependers() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let b = index.get_module(Path::new("/proj/b.js"));
        index.set_dependency(a.id(), edge("./b"), b.id());

        assert!(index.process_file_change(ChangeKind::Change, b.path()));

        let fresh = index.dependency(a.id(), &edge("./b")).unwrap();
        assert!(!Arc::ptr_eq(&fresh, &b));
        assert_eq!(fresh.id(), b.id());
        assert_eq!(fresh.generation(), b.generation() + 1);
        assert_eq!(index.dependers_of(b.id()).len(), 1);
    }

    #[test]
    fn test_change_drops_own_edges() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let b = index.get_module(Path::new("/proj/b.js"));
        index.set_dependency(a.id(), edge("./b"), b.id());

        index.process_file_change(ChangeKind::Change, a.path());

        assert!(index.dependencies_of(a.id()).is_empty());
        assert!(index.dependers_of(b.id()).is_empty());
    }

    #[test]
    fn test_delete_removes_depender_edges() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let b = index.get_module(Path::new("/proj/b.js"));
        index.set_dependency(a.id(), edge("./b"), b.id());

        index.process_file_change(ChangeKind::Delete, b.path());

        assert!(index.dependency(a.id(), &edge("./b")).is_none());
        assert!(index.get(b.path()).is_none());
        assert_eq!(index.len(), 1);

        // Re-adding the file reuses the slot with a new generation
        let back = index.get_module(Path::new("/proj/b.js"));
        assert_eq!(back.id(), b.id());
        assert!(back.generation() > b.generation());
    }

    #[test]
    fn test_edges_are_per_platform() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let ios = index.get_module(Path::new("/proj/b.ios.js"));
        let android = index.get_module(Path::new("/proj/b.android.js"));

        index.set_dependency(a.id(), EdgeKey::new("./b", Some("ios")), ios.id());
        index.set_dependency(a.id(), EdgeKey::new("./b", Some("android")), android.id());

        let resolved = index.dependency(a.id(), &EdgeKey::new("./b", Some("ios"))).unwrap();
        assert!(Arc::ptr_eq(&resolved, &ios));
        assert_eq!(index.dependencies_of(a.id()).len(), 2);
    }

    #[test]
    fn test_retargeting_an_edge_moves_the_depender() {
        let index = ModuleIndex::new();
        let a = index.get_module(Path::new("/proj/a.js"));
        let b = index.get_module(Path::new("/proj/b.js"));
        let c = index.get_module(Path::new("/proj/c.js"));

        index.set_dependency(a.id(), edge("x"), b.id());
        index.set_dependency(a.id(), edge("x"), c.id());

        assert!(index.dependers_of(b.id()).is_empty());
        assert_eq!(index.dependers_of(c.id()).len(), 1);
    }

    #[test]
    fn test_package_instances_reset_on_change() {
        let index = ModuleIndex::new();
        let path = Path::new("/proj/package.json");
        let pkg = index.get_package(path);
        assert!(Arc::ptr_eq(&pkg, &index.get_package(path)));

        assert!(index.process_file_change(ChangeKind::Change, path));
        assert!(!Arc::ptr_eq(&pkg, &index.get_package(path)));
    }
}
