//! Builds a [`ProjectModel`] from a source tree.
//!
//! Discovery and model mutation happen on the calling thread. Parsing and
//! import resolution fan out over a rayon pool and their results are folded
//! into the model afterwards, in a deterministic order.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use crate::{
    analyzer::{PACKAGE_MARKER, ParsedModule, PythonAnalyzer, SourceAnalyzer},
    config::Config,
    import_resolver::{ImportResolver, ModuleRef},
    project_model::{FileId, PackageId, ProjectModel},
};

/// Directory names never treated as packages
const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv"];

pub struct ModelBuilder<'a> {
    analyzer: &'a dyn SourceAnalyzer,
    /// Worker threads; 0 lets rayon pick one per core
    jobs: usize,
}

impl std::fmt::Debug for ModelBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl<'a> ModelBuilder<'a> {
    pub fn new(analyzer: &'a dyn SourceAnalyzer) -> Self {
        Self { analyzer, jobs: 0 }
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Build the model of the package tree rooted at `root_dir`.
    pub fn build(&self, root_dir: &Path) -> Result<ProjectModel> {
        let root_dir = root_dir
            .canonicalize()
            .with_context(|| format!("Failed to access root folder {}", root_dir.display()))?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("Failed to start worker pool")?;

        let mut model = ProjectModel::new(&root_dir);
        for dir in discover_package_dirs(&root_dir) {
            link_package(&mut model, &dir);
        }

        let candidates = collect_files(&model);
        let parsed = pool.install(|| self.parse_all(&candidates));
        for (package, file_name, module) in parsed {
            model.add_file(package, &file_name, module);
        }

        let modules: Vec<(FileId, Arc<ParsedModule>)> = model
            .files()
            .filter_map(|file| file.module.clone().map(|module| (file.id, module)))
            .collect();
        let resolver = ImportResolver::new(self.analyzer);
        let resolved: Vec<(FileId, Vec<ModuleRef>)> = pool.install(|| {
            modules
                .par_iter()
                .map(|(file, module)| (*file, resolver.resolve(module)))
                .collect()
        });
        for (file, targets) in resolved {
            add_edges(&mut model, file, &targets);
        }

        info!(
            "Built model of {}: {} packages, {} files, {} dependencies",
            root_dir.display(),
            model.package_count(),
            model.file_count(),
            model.dependency_edge_count()
        );
        Ok(model)
    }

    /// Parse every Python candidate. Files that fail to parse are dropped
    /// from the model; other files are kept without a module.
    fn parse_all(
        &self,
        candidates: &[(PackageId, PathBuf)],
    ) -> Vec<(PackageId, String, Option<Arc<ParsedModule>>)> {
        candidates
            .par_iter()
            .filter_map(|(package, path)| {
                let file_name = path.file_name()?.to_str()?.to_owned();
                if !is_python_source(path) {
                    return Some((*package, file_name, None));
                }
                match self.analyzer.parse(path) {
                    Ok(module) => Some((*package, file_name, Some(module))),
                    Err(err) => {
                        warn!("Skipping {}: {err:#}", path.display());
                        None
                    }
                }
            })
            .collect()
    }
}

/// Build the model described by a configuration file: the tree under
/// `root-folder`, its policies, and the optional view scope.
pub fn build_model(config: &Config) -> Result<ProjectModel> {
    let root_dir = config.root_folder.canonicalize().with_context(|| {
        format!(
            "Failed to access root folder {}",
            config.root_folder.display()
        )
    })?;

    // Searched after the importing file's own import root
    let analyzer = PythonAnalyzer::new(config.python_path.clone(), config.python_version);

    let mut model = ModelBuilder::new(&analyzer)
        .with_jobs(config.jobs)
        .build(&root_dir)?;
    debug!("Parsed {} modules", analyzer.parsed_count());

    model
        .apply_policies(&config.policies)
        .context("Invalid policy declaration")?;
    if let Some(scope) = &config.scope {
        model.change_scope(scope).context("Invalid scope")?;
    }
    Ok(model)
}

fn is_python_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && (name.starts_with('.') || SKIPPED_DIRS.contains(&&*name))
}

/// Every directory below `root_dir` carrying a package marker, parents
/// before children. Directories that cannot be read are logged and skipped.
fn discover_package_dirs(root_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir() && !is_skipped(entry))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping part of {}: {err}", root_dir.display());
                continue;
            }
        };
        if entry.path().join(PACKAGE_MARKER).is_file() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort_by_key(|dir| dir.components().count());
    dirs
}

/// Attach `dir` to the package of its containing directory, if there is one.
fn link_package(model: &mut ProjectModel, dir: &Path) {
    let parent = dir.parent().and_then(|parent| model.package_by_path(parent));
    let name = dir.file_name().and_then(|name| name.to_str());
    match (parent, name) {
        (Some(parent), Some(name)) => {
            let id = model.add_package(parent, name);
            trace!("Package {} -> {id:?}", dir.display());
        }
        _ => debug!(
            "Skipping {}: its containing directory is not a package",
            dir.display()
        ),
    }
}

/// Immediate files of every package, in name order. A package whose
/// directory cannot be listed keeps no files.
fn collect_files(model: &ProjectModel) -> Vec<(PackageId, PathBuf)> {
    let mut candidates = Vec::new();
    for package in model.packages() {
        match list_files(&package.path) {
            Ok(files) => candidates.extend(files.into_iter().map(|path| (package.id, path))),
            Err(err) => warn!("Skipping files of {}: {err:#}", package.path.display()),
        }
    }
    candidates
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type()?.is_file() && !hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn add_edges(model: &mut ProjectModel, file: FileId, targets: &[ModuleRef]) {
    for target in targets {
        match model.file_by_path(&target.path) {
            Some(dest) if dest != file => model.add_dependency(file, dest),
            Some(_) => {}
            None => trace!(
                "{} imports {} from outside the project",
                model.file(file).relative_path,
                target.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) -> Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn sample_tree() -> Result<TempDir> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("shop");
        write(&root, "__init__.py", "")?;
        write(&root, "api/__init__.py", "")?;
        write(&root, "api/views.py", "from shop.core import models\nimport requests\n")?;
        write(&root, "api/v1/__init__.py", "")?;
        write(&root, "api/v1/handlers.py", "from ..views import render\nfrom ...core.models import Item\n")?;
        write(&root, "api/README.md", "# api\n")?;
        write(&root, "core/__init__.py", "")?;
        write(&root, "core/models.py", "import os\n")?;
        write(&root, "core/broken.py", "def broken(:\n")?;
        // Not reachable through package markers
        write(&root, "scripts/tools/__init__.py", "")?;
        write(&root, "scripts/tools/run.py", "import shop.api\n")?;
        Ok(temp_dir)
    }

    fn edge_paths(model: &ProjectModel) -> Vec<(String, String)> {
        let mut edges: Vec<_> = model
            .dependency_edges()
            .map(|(from, to)| {
                (
                    model.file(from).relative_path.clone(),
                    model.file(to).relative_path.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn test_builds_package_tree() -> Result<()> {
        let temp_dir = sample_tree()?;
        let analyzer = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let model = ModelBuilder::new(&analyzer).build(&temp_dir.path().join("shop"))?;

        let mut packages: Vec<_> = model
            .packages()
            .map(|package| package.relative_path.as_str())
            .collect();
        packages.sort_unstable();
        assert_eq!(packages, vec!["", "api", "api/v1", "core"]);
        assert_eq!(model.package(model.root()).name, "shop");

        let api = model.get_package("api")?;
        let labels: Vec<_> = model
            .package(api)
            .files
            .iter()
            .map(|&file| model.file(file).label.as_str())
            .collect();
        assert_eq!(labels, vec!["README.md", "__init__.py", "views.py"]);
        Ok(())
    }

    #[test]
    fn test_parse_failures_are_skipped() -> Result<()> {
        let temp_dir = sample_tree()?;
        let analyzer = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let model = ModelBuilder::new(&analyzer).build(&temp_dir.path().join("shop"))?;

        assert!(model.get_file("core.broken").is_err());
        assert!(model.get_file("core.models").is_ok());
        let readme = model
            .files()
            .find(|file| file.label == "README.md")
            .expect("non-Python files stay in the model");
        assert!(readme.module.is_none());
        Ok(())
    }

    #[test]
    fn test_resolves_edges() -> Result<()> {
        let temp_dir = sample_tree()?;
        let analyzer = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let model = ModelBuilder::new(&analyzer).build(&temp_dir.path().join("shop"))?;

        assert_eq!(
            edge_paths(&model),
            vec![
                ("api/v1/handlers.py".to_owned(), "api/views.py".to_owned()),
                ("api/v1/handlers.py".to_owned(), "core/models.py".to_owned()),
                ("api/views.py".to_owned(), "core/models.py".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_worker_count_does_not_change_result() -> Result<()> {
        let temp_dir = sample_tree()?;
        let root = temp_dir.path().join("shop");

        let single = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let sequential = ModelBuilder::new(&single).with_jobs(1).build(&root)?;
        let pooled = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let parallel = ModelBuilder::new(&pooled).with_jobs(4).build(&root)?;

        assert_eq!(edge_paths(&sequential), edge_paths(&parallel));
        assert_eq!(sequential.file_count(), parallel.file_count());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directories_are_skipped() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = sample_tree()?;
        let root = temp_dir.path().join("shop");
        write(&root, "data/cache/__init__.py", "")?;
        let data = root.join("data");
        let v1 = root.join("api/v1");
        // `data` cannot be entered at all, `api/v1` cannot be listed
        fs::set_permissions(&data, fs::Permissions::from_mode(0o000))?;
        fs::set_permissions(&v1, fs::Permissions::from_mode(0o311))?;

        let analyzer = PythonAnalyzer::new(vec![temp_dir.path().to_path_buf()], 12);
        let built = ModelBuilder::new(&analyzer).build(&root);
        fs::set_permissions(&data, fs::Permissions::from_mode(0o755))?;
        fs::set_permissions(&v1, fs::Permissions::from_mode(0o755))?;

        let model = built?;
        assert!(model.get_package("api.v1").is_ok());
        assert!(model.get_package("data").is_err());
        assert!(model.get_file("core.models").is_ok());
        assert!(
            edge_paths(&model)
                .contains(&("api/views.py".to_owned(), "core/models.py".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn test_build_model_from_config() -> Result<()> {
        let temp_dir = sample_tree()?;
        let config = Config::from_toml(
            r#"
root-folder = "shop"
scope = "api"

[[policies]]
kind = "cannot-depend-on"
from = { package = "core" }
to = { package = "api" }
"#,
        )?;
        let config = Config {
            root_folder: temp_dir.path().join(&config.root_folder),
            ..config
        };

        let model = build_model(&config)?;
        assert_eq!(model.scope(), model.get_package("api")?);
        assert_eq!(model.policies().len(), 1);
        assert_eq!(model.validate(), Ok(()));
        Ok(())
    }
}
