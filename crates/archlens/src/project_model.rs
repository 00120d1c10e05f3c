//! The project model: packages, files and file-level dependency edges.
//!
//! Packages and files live in arenas and refer to each other through
//! [`PackageId`] / [`FileId`]. Parent/child links, file ownership and policy
//! targets are all plain ids, so the model has no reference cycles and can be
//! read from several threads once it is built.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use petgraph::{Direction, graphmap::DiGraphMap};
use rustc_hash::FxHashMap;

use crate::{analyzer::ParsedModule, error::ModelError, policy::Policy};

/// Unique identifier for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(u32);

impl PackageId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Either kind of model node; the subject or target of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Package(PackageId),
    File(FileId),
}

impl From<PackageId> for NodeRef {
    fn from(id: PackageId) -> Self {
        Self::Package(id)
    }
}

impl From<FileId> for NodeRef {
    fn from(id: FileId) -> Self {
        Self::File(id)
    }
}

/// A directory holding Python source files.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    /// Absolute directory path
    pub path: PathBuf,
    /// Slash-separated path relative to the root package; empty for the root
    pub relative_path: String,
    pub name: String,
    /// Distance from the root package
    pub depth: usize,
    pub parent: Option<PackageId>,
    pub children: Vec<PackageId>,
    pub files: Vec<FileId>,
}

/// A single file of a package.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    /// Absolute file path
    pub path: PathBuf,
    /// Slash-separated path relative to the root package
    pub relative_path: String,
    pub label: String,
    pub package: PackageId,
    /// Parsed module; `None` for files that are not Python sources
    pub module: Option<Arc<ParsedModule>>,
}

#[derive(Debug, Clone)]
pub struct ProjectModel {
    packages: Vec<Package>,
    files: Vec<SourceFile>,
    package_by_path: FxHashMap<PathBuf, PackageId>,
    package_by_relative: FxHashMap<String, PackageId>,
    file_by_path: FxHashMap<PathBuf, FileId>,
    file_by_relative: FxHashMap<String, FileId>,
    /// File-level edges; adding an existing edge again is a no-op
    dependencies: DiGraphMap<FileId, ()>,
    root: PackageId,
    scope: PackageId,
    pub(crate) policies: Vec<Policy>,
}

impl ProjectModel {
    /// Create a model holding only the root package at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let path = root_dir.into();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("root")
            .to_owned();
        let root = PackageId(0);

        let mut model = Self {
            packages: Vec::new(),
            files: Vec::new(),
            package_by_path: FxHashMap::default(),
            package_by_relative: FxHashMap::default(),
            file_by_path: FxHashMap::default(),
            file_by_relative: FxHashMap::default(),
            dependencies: DiGraphMap::new(),
            root,
            scope: root,
            policies: Vec::new(),
        };
        model.insert_package(Package {
            id: root,
            path,
            relative_path: String::new(),
            name,
            depth: 0,
            parent: None,
            children: Vec::new(),
            files: Vec::new(),
        });
        model
    }

    fn insert_package(&mut self, package: Package) -> PackageId {
        let id = package.id;
        self.package_by_path.insert(package.path.clone(), id);
        self.package_by_relative
            .insert(package.relative_path.clone(), id);
        self.packages.push(package);
        id
    }

    /// Add the package for directory `dir_name` inside `parent`.
    pub fn add_package(&mut self, parent: PackageId, dir_name: &str) -> PackageId {
        let parent_package = self.package(parent);
        let path = parent_package.path.join(dir_name);
        if let Some(&existing) = self.package_by_path.get(&path) {
            return existing;
        }

        let id = PackageId(self.packages.len() as u32);
        let package = Package {
            id,
            relative_path: join_relative(&parent_package.relative_path, dir_name),
            name: dir_name.to_owned(),
            depth: parent_package.depth + 1,
            parent: Some(parent),
            children: Vec::new(),
            files: Vec::new(),
            path,
        };
        self.packages[parent.index()].children.push(id);
        self.insert_package(package)
    }

    /// Add file `file_name` to `package`.
    pub fn add_file(
        &mut self,
        package: PackageId,
        file_name: &str,
        module: Option<Arc<ParsedModule>>,
    ) -> FileId {
        let owner = self.package(package);
        let path = owner.path.join(file_name);
        if let Some(&existing) = self.file_by_path.get(&path) {
            return existing;
        }

        let id = FileId(self.files.len() as u32);
        let relative_path = join_relative(&owner.relative_path, file_name);
        self.file_by_path.insert(path.clone(), id);
        self.file_by_relative.insert(relative_path.clone(), id);
        self.packages[package.index()].files.push(id);
        self.dependencies.add_node(id);
        self.files.push(SourceFile {
            id,
            path,
            relative_path,
            label: file_name.to_owned(),
            package,
            module,
        });
        id
    }

    /// Record that `from` imports `to`. Duplicate edges collapse into one.
    pub fn add_dependency(&mut self, from: FileId, to: FileId) {
        self.dependencies.add_edge(from, to, ());
    }

    pub fn root(&self) -> PackageId {
        self.root
    }

    pub fn root_dir(&self) -> &Path {
        &self.package(self.root).path
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn package_by_path(&self, path: &Path) -> Option<PackageId> {
        self.package_by_path.get(path).copied()
    }

    pub fn file_by_path(&self, path: &Path) -> Option<FileId> {
        self.file_by_path.get(path).copied()
    }

    /// Outgoing file-level dependencies of `file`.
    pub fn dependencies(&self, file: FileId) -> impl Iterator<Item = FileId> + '_ {
        self.dependencies
            .neighbors_directed(file, Direction::Outgoing)
    }

    /// Every file-level edge of the model.
    pub fn dependency_edges(&self) -> impl Iterator<Item = (FileId, FileId)> + '_ {
        self.dependencies.all_edges().map(|(from, to, _)| (from, to))
    }

    pub fn dependency_edge_count(&self) -> usize {
        self.dependencies.edge_count()
    }

    /// Look up a package by its dotted (or slash-separated) path relative to
    /// the root package. The empty path is the root itself.
    pub fn get_package(&self, dotted_path: &str) -> Result<PackageId, ModelError> {
        let relative = normalize_path(dotted_path);
        self.package_by_relative
            .get(&relative)
            .or_else(|| {
                self.strip_root_name(&relative)
                    .and_then(|rest| self.package_by_relative.get(rest))
            })
            .copied()
            .ok_or_else(|| ModelError::PackageNotFound(dotted_path.to_owned()))
    }

    /// Look up a file by its dotted module path, e.g. `api.views` for
    /// `api/views.py` or `api` for `api/__init__.py`.
    pub fn get_file(&self, dotted_path: &str) -> Result<FileId, ModelError> {
        let relative = normalize_path(dotted_path);
        let lookup = |relative: &str| {
            let module_file = format!("{relative}.py");
            let package_init = join_relative(relative, "__init__.py");
            self.file_by_relative
                .get(&module_file)
                .or_else(|| self.file_by_relative.get(&package_init))
                .copied()
        };

        lookup(&relative)
            .or_else(|| self.strip_root_name(&relative).and_then(lookup))
            .ok_or_else(|| ModelError::FileNotFound(dotted_path.to_owned()))
    }

    /// Paths may be spelled with the root package's own name in front.
    fn strip_root_name<'p>(&self, relative: &'p str) -> Option<&'p str> {
        let root_name = &self.package(self.root).name;
        if relative == root_name {
            return Some("");
        }
        relative
            .strip_prefix(root_name.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    /// Re-root every following view evaluation at the named package.
    pub fn change_scope(&mut self, dotted_path: &str) -> Result<PackageId, ModelError> {
        let scope = self.get_package(dotted_path)?;
        self.scope = scope;
        Ok(scope)
    }

    pub fn scope(&self) -> PackageId {
        self.scope
    }

    /// Ancestors of `package`, nearest first, excluding the package itself.
    pub fn ancestors(&self, package: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        std::iter::successors(self.package(package).parent, |&id| {
            self.package(id).parent
        })
    }

    /// `package` followed by all of its ancestors.
    pub fn package_chain(&self, package: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        std::iter::once(package).chain(self.ancestors(package))
    }

    pub fn is_in_subtree(&self, package: PackageId, subtree_root: PackageId) -> bool {
        self.package_chain(package).any(|id| id == subtree_root)
    }

    /// `package` and every package below it, depth first.
    pub fn subtree(&self, package: PackageId) -> Vec<PackageId> {
        let mut result = Vec::new();
        let mut stack = vec![package];
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.package(id).children.iter().rev().copied());
        }
        result
    }

    /// Every package strictly below `package`.
    pub fn descendants(&self, package: PackageId) -> Vec<PackageId> {
        let mut subtree = self.subtree(package);
        subtree.remove(0);
        subtree
    }

    pub fn files_in_subtree(&self, package: PackageId) -> Vec<FileId> {
        self.subtree(package)
            .into_iter()
            .flat_map(|id| self.package(id).files.iter().copied())
            .collect()
    }

    /// Number of file edges from `from`'s subtree into `to`'s subtree.
    pub fn dependency_count(&self, from: PackageId, to: PackageId) -> usize {
        self.dependency_edges()
            .filter(|&(source, target)| {
                self.is_in_subtree(self.file(source).package, from)
                    && self.is_in_subtree(self.file(target).package, to)
            })
            .count()
    }
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

/// Turn a configured or user supplied path (`api.v1`, `api/v1/`) into the
/// slash-separated form used as package identity inside views.
pub fn normalize_path(path: &str) -> String {
    path.replace('.', "/").trim_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// shop/{api/{v1}, core}, with one file per package
    fn sample_model() -> ProjectModel {
        let mut model = ProjectModel::new("/work/shop");
        let root = model.root();
        let api = model.add_package(root, "api");
        let v1 = model.add_package(api, "v1");
        let core = model.add_package(root, "core");

        let init = model.add_file(root, "__init__.py", None);
        let views = model.add_file(api, "views.py", None);
        let handlers = model.add_file(v1, "handlers.py", None);
        let models = model.add_file(core, "models.py", None);

        model.add_dependency(views, models);
        model.add_dependency(handlers, models);
        model.add_dependency(handlers, views);
        model.add_dependency(handlers, models);
        model.add_dependency(init, views);
        model
    }

    #[test]
    fn test_parent_links_follow_directories() {
        let model = sample_model();
        let parentless: Vec<_> = model.packages().filter(|p| p.parent.is_none()).collect();
        assert_eq!(parentless.len(), 1);
        assert_eq!(parentless[0].id, model.root());

        for package in model.packages() {
            if let Some(parent) = package.parent {
                assert_eq!(
                    package.path.parent(),
                    Some(model.package(parent).path.as_path())
                );
                assert_eq!(package.depth, model.package(parent).depth + 1);
            }
        }
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let model = sample_model();
        assert_eq!(model.dependency_edge_count(), 4);
    }

    #[test]
    fn test_lookups() {
        let model = sample_model();
        let v1 = model.get_package("api.v1").expect("api.v1 exists");
        assert_eq!(model.package(v1).relative_path, "api/v1");
        assert_eq!(model.get_package("api/v1"), Ok(v1));
        assert_eq!(model.get_package("shop.api.v1"), Ok(v1));
        assert_eq!(model.get_package(""), Ok(model.root()));

        let handlers = model.get_file("api.v1.handlers").expect("file exists");
        assert_eq!(model.file(handlers).label, "handlers.py");
        let init = model.get_file("shop").expect("root __init__ exists");
        assert_eq!(model.file(init).relative_path, "__init__.py");

        assert_eq!(
            model.get_package("api.v2"),
            Err(ModelError::PackageNotFound("api.v2".to_owned()))
        );
        assert_eq!(
            model.get_file("core.missing"),
            Err(ModelError::FileNotFound("core.missing".to_owned()))
        );
    }

    #[test]
    fn test_subtree_queries() {
        let model = sample_model();
        let api = model.get_package("api").expect("api exists");
        let v1 = model.get_package("api.v1").expect("v1 exists");
        let core = model.get_package("core").expect("core exists");

        assert_eq!(model.descendants(api), vec![v1]);
        assert_eq!(
            model.ancestors(v1).collect::<Vec<_>>(),
            vec![api, model.root()]
        );
        assert!(model.is_in_subtree(v1, api));
        assert!(!model.is_in_subtree(core, api));
        assert_eq!(model.files_in_subtree(api).len(), 2);

        assert_eq!(model.dependency_count(api, core), 2);
        assert_eq!(model.dependency_count(v1, api), 1);
        assert_eq!(model.dependency_count(model.root(), model.root()), 4);
    }

    #[test]
    fn test_change_scope() {
        let mut model = sample_model();
        let api = model.change_scope("api").expect("api exists");
        assert_eq!(model.scope(), api);
        assert!(model.change_scope("nope").is_err());
        assert_eq!(model.scope(), api);
    }
}
