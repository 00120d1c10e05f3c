//! Project configuration loaded from `archlens.toml`.
//!
//! Paths inside the file are relative to the directory that contains it.
//! [`Config::load`] anchors them there.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{policy::PolicyKind, render::OutputFormat};

pub const DEFAULT_CONFIG_FILE: &str = "archlens.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Project name, used in diagram titles and output file names
    pub name: String,
    /// Directory of the root package
    pub root_folder: PathBuf,
    /// Where rendered diagrams are written
    pub save_location: PathBuf,
    /// Document format of rendered views
    pub format: OutputFormat,
    pub show_dependency_count: bool,
    pub package_color: String,
    /// Extra directories searched when resolving absolute imports
    pub python_path: Vec<PathBuf>,
    /// Python 3 minor version used to recognise standard library imports
    pub python_version: u8,
    /// Worker threads for parsing; 0 means one per available core
    pub jobs: usize,
    /// Optional package that views are re-rooted at
    pub scope: Option<String>,
    pub views: IndexMap<String, ViewSpec>,
    pub policies: Vec<PolicyRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: String::new(),
            root_folder: PathBuf::from("."),
            save_location: PathBuf::from("./diagrams"),
            format: OutputFormat::PlantUml,
            show_dependency_count: true,
            package_color: "#Azure".to_owned(),
            python_path: Vec::new(),
            python_version: 12,
            jobs: 0,
            scope: None,
            views: IndexMap::new(),
            policies: Vec::new(),
        }
    }
}

impl Config {
    /// Read and parse a configuration file, resolving relative paths against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.anchor_paths(&base_dir);
        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    fn anchor_paths(&mut self, base_dir: &Path) {
        self.root_folder = base_dir.join(&self.root_folder);
        self.save_location = base_dir.join(&self.save_location);
        for dir in &mut self.python_path {
            *dir = base_dir.join(&*dir);
        }
    }

    /// The same configuration pointed at another checkout of the project.
    ///
    /// `config_dir` is the directory holding the configuration in the current
    /// checkout; the root folder keeps its position relative to it.
    pub fn rebased(&self, config_dir: &Path, other_checkout: &Path) -> Self {
        let mut config = self.clone();
        if let Ok(relative) = self.root_folder.strip_prefix(config_dir) {
            config.root_folder = other_checkout.join(relative);
        }
        config.python_path = self
            .python_path
            .iter()
            .map(|dir| match dir.strip_prefix(config_dir) {
                Ok(relative) => other_checkout.join(relative),
                Err(_) => dir.clone(),
            })
            .collect();
        config
    }
}

/// A named, declarative selection of packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewSpec {
    pub packages: Vec<PackageSelector>,
    pub ignore_packages: Vec<String>,
    pub use_package_path_as_label: Option<bool>,
}

impl ViewSpec {
    pub fn use_package_path_as_label(&self) -> bool {
        self.use_package_path_as_label.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PackageSelector {
    /// Every package whose path starts with the prefix
    Prefix(String),
    /// The package at `path` and its descendants up to `depth` levels below
    Anchored { path: String, depth: usize },
}

/// A policy as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyRule {
    pub kind: PolicyKind,
    pub from: NodeSelector,
    pub to: NodeSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSelector {
    Package(String),
    File(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r##"
name = "shop"
root-folder = "src/shop"
show-dependency-count = false
package-color = "#LightBlue"

[views.overview]
packages = ["", { path = "api", depth = 1 }]
ignore-packages = ["*tests*"]
use-package-path-as-label = false

[views.everything]

[[policies]]
kind = "cannot-depend-on"
from = { package = "core" }
to = { package = "api" }

[[policies]]
kind = "must-depend-on"
from = { file = "api.app" }
to = { file = "core.config" }
"##,
        )
        .expect("config should parse");

        assert_eq!(config.name, "shop");
        assert_eq!(config.root_folder, PathBuf::from("src/shop"));
        assert!(!config.show_dependency_count);
        assert_eq!(config.views.len(), 2);

        let overview = &config.views["overview"];
        assert_eq!(
            overview.packages,
            vec![
                PackageSelector::Prefix(String::new()),
                PackageSelector::Anchored {
                    path: "api".to_owned(),
                    depth: 1
                },
            ]
        );
        assert_eq!(overview.ignore_packages, vec!["*tests*".to_owned()]);
        assert!(!overview.use_package_path_as_label());
        assert!(config.views["everything"].use_package_path_as_label());

        assert_eq!(
            config.policies[0],
            PolicyRule {
                kind: PolicyKind::CannotDependOn,
                from: NodeSelector::Package("core".to_owned()),
                to: NodeSelector::Package("api".to_owned()),
            }
        );
        assert_eq!(config.policies[1].kind, PolicyKind::MustDependOn);
        assert_eq!(
            config.policies[1].from,
            NodeSelector::File("api.app".to_owned())
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").expect("empty config should parse");
        assert!(config.show_dependency_count);
        assert_eq!(config.package_color, "#Azure");
        assert_eq!(config.jobs, 0);
        assert!(config.views.is_empty());
        assert!(config.scope.is_none());
    }

    #[test]
    fn test_rebased_keeps_relative_root() {
        let config = Config {
            root_folder: PathBuf::from("/work/pr/src/shop"),
            python_path: vec![PathBuf::from("/work/pr/vendor"), PathBuf::from("/opt/lib")],
            ..Default::default()
        };
        let rebased = config.rebased(Path::new("/work/pr"), Path::new("/work/main"));
        assert_eq!(rebased.root_folder, PathBuf::from("/work/main/src/shop"));
        assert_eq!(
            rebased.python_path,
            vec![PathBuf::from("/work/main/vendor"), PathBuf::from("/opt/lib")]
        );
    }
}
