//! Turns the import statements of a parsed file into canonical module
//! identities.
//!
//! Relative imports are made absolute first, then every candidate module
//! name is handed to the [`SourceAnalyzer`]. Anything the analyzer cannot map
//! to a file (third-party packages, the standard library, typos) is dropped
//! without a report: such imports are not architectural edges of the project.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    analyzer::{PACKAGE_MARKER, ParsedModule, SourceAnalyzer},
    visitors::DiscoveredImport,
};

/// A resolved import target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    /// Absolute dotted module name
    pub name: String,
    /// File that defines the module
    pub path: PathBuf,
}

#[derive(Clone, Copy)]
pub struct ImportResolver<'a> {
    analyzer: &'a dyn SourceAnalyzer,
}

impl std::fmt::Debug for ImportResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportResolver").finish_non_exhaustive()
    }
}

impl<'a> ImportResolver<'a> {
    pub fn new(analyzer: &'a dyn SourceAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Resolve every import of `module`, in source order and without
    /// duplicates.
    pub fn resolve(&self, module: &ParsedModule) -> Vec<ModuleRef> {
        let Some(context_dir) = module.path().parent() else {
            return Vec::new();
        };

        let mut resolved = IndexSet::new();
        for import in module.imports() {
            for candidates in candidate_names(import, context_dir) {
                if let Some(module_ref) = self.first_resolvable(&candidates, context_dir) {
                    resolved.insert(module_ref);
                }
            }
        }

        trace!(
            "{}: {} of {} imports resolved",
            module.path().display(),
            resolved.len(),
            module.imports().len()
        );
        resolved.into_iter().collect()
    }

    fn first_resolvable(&self, candidates: &[String], context_dir: &Path) -> Option<ModuleRef> {
        candidates.iter().find_map(|name| {
            match self.analyzer.resolve_module(name, context_dir) {
                Ok(Some(path)) => Some(ModuleRef {
                    name: name.clone(),
                    path,
                }),
                Ok(None) => None,
                Err(err) => {
                    debug!("Dropping import '{name}': {err:#}");
                    None
                }
            }
        })
    }
}

/// Candidate module names for one import statement.
///
/// Each inner list is tried in order and contributes at most one target:
/// `from pkg import a, b` yields `[pkg.a, pkg]` and `[pkg.b, pkg]`, since the
/// imported names may be submodules or plain attributes of `pkg`.
fn candidate_names(import: &DiscoveredImport, context_dir: &Path) -> Vec<Vec<String>> {
    let base = if import.is_relative() {
        match absolute_module_name(context_dir, import.level, import.module_name.as_deref()) {
            Some(base) => base,
            None => return Vec::new(),
        }
    } else {
        import.module_name.clone().unwrap_or_default()
    };

    if !import.is_from_import() {
        return if base.is_empty() {
            Vec::new()
        } else {
            vec![vec![base]]
        };
    }

    import
        .names
        .iter()
        .map(|(name, _)| {
            let mut candidates = Vec::with_capacity(2);
            if name != "*" {
                candidates.push(join_module(&base, name));
            }
            if !base.is_empty() {
                candidates.push(base.clone());
            }
            candidates
        })
        .filter(|candidates| !candidates.is_empty())
        .collect()
}

fn join_module(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else {
        format!("{base}.{name}")
    }
}

/// Make a relative import absolute.
///
/// Walks up `level - 1` directories from `file_dir` (one dot is the file's
/// own package), then prefixes the dotted package path of that directory:
/// every enclosing directory carrying `__init__.py`, up to the first one that
/// does not. Returns `None` when the walk leaves the package hierarchy, which
/// Python reports as an import error.
pub fn absolute_module_name(file_dir: &Path, level: u32, module: Option<&str>) -> Option<String> {
    let is_package = |dir: &Path| dir.join(PACKAGE_MARKER).is_file();
    let mut base = file_dir;
    for _ in 1..level {
        if !is_package(base) {
            return None;
        }
        base = base.parent()?;
    }
    if !is_package(base) {
        return None;
    }

    let mut parts = Vec::new();
    let mut current = base;
    while current.join(PACKAGE_MARKER).is_file() {
        let Some(name) = current.file_name().and_then(|n| n.to_str()) else {
            break;
        };
        parts.push(name.to_owned());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    parts.reverse();

    if let Some(module) = module {
        parts.extend(module.split('.').filter(|s| !s.is_empty()).map(String::from));
    }
    Some(parts.join("."))
}
