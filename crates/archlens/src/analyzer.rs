//! Source analysis: parsing Python files and mapping module names to files.
//!
//! The [`SourceAnalyzer`] trait is the seam between the dependency model and
//! the Python front end. [`PythonAnalyzer`] implements it with ruff's parser
//! and Python's on-disk import rules. Both of its caches are shared between
//! the parsing workers, so every file is parsed at most once per run and every
//! `(module, context)` pair is resolved at most once.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use dashmap::{DashMap, mapref::entry::Entry};
use indexmap::IndexSet;
use log::{debug, trace, warn};
use ruff_python_ast::ModModule;
use ruff_python_parser::parse_module;
use ruff_python_stdlib::sys;

use crate::visitors::{DiscoveredImport, discover_imports};

pub const PACKAGE_MARKER: &str = "__init__.py";

/// A parsed source file and the imports found in it.
#[derive(Debug)]
pub struct ParsedModule {
    path: PathBuf,
    imports: Vec<DiscoveredImport>,
}

impl ParsedModule {
    pub fn new(path: PathBuf, ast: &ModModule) -> Self {
        Self {
            path,
            imports: discover_imports(ast),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn imports(&self) -> &[DiscoveredImport] {
        &self.imports
    }
}

/// Front end used by the model builder. Implementations must be idempotent
/// and safe to call from several workers at once.
pub trait SourceAnalyzer: Send + Sync {
    /// Parse a source file.
    fn parse(&self, path: &Path) -> Result<Arc<ParsedModule>>;

    /// Map an absolute dotted module name to the file that defines it.
    ///
    /// `context_dir` is the directory of the importing file. `Ok(None)` means
    /// the module is not part of anything this analyzer can see (third-party,
    /// standard library, or simply missing).
    fn resolve_module(&self, module_name: &str, context_dir: &Path) -> Result<Option<PathBuf>>;
}

/// Check if a module is part of the Python standard library using ruff_python_stdlib
fn is_stdlib_module(module_name: &str, python_version: u8) -> bool {
    if module_name == "__future__" {
        return true;
    }

    let top_level = module_name.split('.').next().unwrap_or(module_name);
    sys::is_known_standard_library(python_version, top_level)
}

/// Module descriptor for import resolution
#[derive(Debug)]
struct ImportModuleDescriptor {
    /// Number of leading dots for relative imports
    leading_dots: usize,
    /// Module name parts (e.g., ["foo", "bar"] for "foo.bar")
    name_parts: Vec<String>,
}

impl ImportModuleDescriptor {
    fn from_module_name(name: &str) -> Self {
        let leading_dots = name.chars().take_while(|c| *c == '.').count();
        let name_parts = name[leading_dots..]
            .split('.')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self {
            leading_dots,
            name_parts,
        }
    }
}

/// Walk up from `dir` past every directory carrying a package marker.
///
/// The result is the directory an absolute import of `dir`'s package would be
/// resolved from.
pub fn import_root(dir: &Path) -> &Path {
    let mut current = dir;
    while current.join(PACKAGE_MARKER).is_file() {
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// ruff-backed [`SourceAnalyzer`].
#[derive(Debug)]
pub struct PythonAnalyzer {
    /// Directories searched after the importing file's own import root
    search_paths: Vec<PathBuf>,
    /// Python 3 minor version for stdlib classification
    python_version: u8,
    parse_cache: DashMap<PathBuf, Arc<ParsedModule>>,
    module_cache: DashMap<(String, PathBuf), Option<PathBuf>>,
}

impl PythonAnalyzer {
    pub fn new(search_paths: Vec<PathBuf>, python_version: u8) -> Self {
        let search_paths = search_paths
            .into_iter()
            .map(canonicalize_path)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        Self {
            search_paths,
            python_version,
            parse_cache: DashMap::new(),
            module_cache: DashMap::new(),
        }
    }

    /// Number of distinct files parsed so far.
    pub fn parsed_count(&self) -> usize {
        self.parse_cache.len()
    }

    /// Directories tried, in order, for a module imported from `context_dir`.
    ///
    /// The importing directory comes first, then the root its package is
    /// imported from, then the configured search paths.
    pub fn search_directories(&self, context_dir: &Path) -> Vec<PathBuf> {
        let mut unique_dirs = IndexSet::new();
        unique_dirs.insert(context_dir.to_path_buf());
        unique_dirs.insert(import_root(context_dir).to_path_buf());
        unique_dirs.extend(self.search_paths.iter().cloned());
        unique_dirs.into_iter().collect()
    }

    fn lookup(&self, module_name: &str, context_dir: &Path) -> Result<Option<PathBuf>> {
        if is_stdlib_module(module_name, self.python_version) {
            trace!("Skipping standard library import '{module_name}'");
            return Ok(None);
        }

        let descriptor = ImportModuleDescriptor::from_module_name(module_name);
        if descriptor.leading_dots > 0 {
            warn!("Cannot resolve relative import '{module_name}' without making it absolute first");
            return Ok(None);
        }

        for search_dir in self.search_directories(context_dir) {
            if let Some(resolved) = resolve_in_directory(&search_dir, &descriptor)? {
                return Ok(Some(canonicalize_path(resolved)));
            }
        }

        debug!("Module '{module_name}' not found from {}", context_dir.display());
        Ok(None)
    }
}

impl SourceAnalyzer for PythonAnalyzer {
    fn parse(&self, path: &Path) -> Result<Arc<ParsedModule>> {
        match self.parse_cache.entry(canonicalize_path(path.to_path_buf())) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let source = std::fs::read_to_string(entry.key())
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let parsed = parse_module(&source)
                    .map_err(|err| anyhow!("Failed to parse {}: {err}", path.display()))?;
                let module = Arc::new(ParsedModule::new(entry.key().clone(), parsed.syntax()));
                trace!(
                    "Parsed {} ({} imports)",
                    path.display(),
                    module.imports().len()
                );
                entry.insert(Arc::clone(&module));
                Ok(module)
            }
        }
    }

    fn resolve_module(&self, module_name: &str, context_dir: &Path) -> Result<Option<PathBuf>> {
        let key = (module_name.to_owned(), context_dir.to_path_buf());
        match self.module_cache.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let resolved = self.lookup(module_name, context_dir)?;
                entry.insert(resolved.clone());
                Ok(resolved)
            }
        }
    }
}

/// Canonicalize a path, handling errors gracefully
fn canonicalize_path(path: PathBuf) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) => {
            debug!("Failed to canonicalize path {}: {}", path.display(), e);
            path
        }
    }
}

/// Resolve a module within a specific directory.
///
/// For the last name part a package (`foo/__init__.py`) wins over a module
/// file (`foo.py`). Intermediate parts may be regular or namespace packages.
/// A namespace package as the final part has no file to depend on and is
/// reported as unresolved.
fn resolve_in_directory(
    root: &Path,
    descriptor: &ImportModuleDescriptor,
) -> Result<Option<PathBuf>> {
    let Some((last, intermediate)) = descriptor.name_parts.split_last() else {
        return Ok(None);
    };

    let mut current_path = root.to_path_buf();
    for part in intermediate {
        let package_dir = current_path.join(part);
        if !package_dir.is_dir() {
            return Ok(None);
        }
        current_path = package_dir;
    }

    let package_init = current_path.join(last).join(PACKAGE_MARKER);
    if package_init.is_file() {
        trace!("Found package at: {package_init:?}");
        return Ok(Some(package_init));
    }

    let module_file = current_path.join(format!("{last}.py"));
    if module_file.is_file() {
        trace!("Found module file at: {module_file:?}");
        return Ok(Some(module_file));
    }

    Ok(None)
}
