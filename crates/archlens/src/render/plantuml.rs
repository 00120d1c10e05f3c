//! PlantUML package diagrams.

use std::fmt::{self, Write as _};

use anyhow::Result;

use super::{Renderer, diagram_title, label_of};
use crate::{
    config::Config,
    view::{DependencyRender, EntityState, View, ViewDependency},
};

const CREATED_COLOR: &str = "#Green";
const DELETED_COLOR: &str = "#Red";

/// Renders PlantUML package diagrams.
#[derive(Debug, Clone)]
pub struct PlantUmlRenderer {
    project_name: String,
    show_dependency_count: bool,
    package_color: String,
}

impl PlantUmlRenderer {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            show_dependency_count: true,
            package_color: "#Azure".to_owned(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            project_name: config.name.clone(),
            show_dependency_count: config.show_dependency_count,
            package_color: config.package_color.clone(),
        }
    }

    fn color(&self, state: EntityState) -> &str {
        match state {
            EntityState::Neutral => self.package_color.as_str(),
            EntityState::Created => CREATED_COLOR,
            EntityState::Deleted => DELETED_COLOR,
        }
    }

    fn write_dependency(
        &self,
        out: &mut String,
        dependency: &ViewDependency,
        from: &str,
        to: &str,
    ) -> fmt::Result {
        write!(out, "\"{from}\"-->\"{to}\"")?;
        let state = dependency.display_state();
        if state != EntityState::Neutral {
            write!(out, " {}", self.color(state))?;
        }
        match &dependency.render {
            DependencyRender::DiffAnnotated { label, .. } => write!(out, " : {label}")?,
            DependencyRender::Normal if self.show_dependency_count => {
                write!(out, " : {}", dependency.count)?;
            }
            DependencyRender::Normal => {}
        }
        writeln!(out)
    }

    fn write_document(&self, out: &mut String, view_name: &str, packages: &View) -> fmt::Result {
        let prefix = common_prefix(packages.values().map(|package| package.label.as_str()));
        let shown = |path: &str| {
            let label = label_of(packages, path);
            prefix
                .as_deref()
                .and_then(|prefix| label.strip_prefix(prefix))
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(label)
                .to_owned()
        };

        let title = diagram_title(&self.project_name, view_name);
        writeln!(out, "@startuml")?;
        writeln!(out, "skinparam backgroundColor GhostWhite")?;
        match &prefix {
            Some(prefix) => writeln!(out, "title {title}\\n<size:12>{prefix}.*</size>")?,
            None => writeln!(out, "title {title}")?,
        }
        for package in packages.values() {
            writeln!(
                out,
                "package \"{}\" {}",
                shown(&package.path),
                self.color(package.state)
            )?;
        }
        for package in packages.values() {
            for dependency in &package.dependencies {
                self.write_dependency(
                    out,
                    dependency,
                    &shown(&dependency.source),
                    &shown(&dependency.destination),
                )?;
            }
        }
        writeln!(out, "@enduml")
    }
}

impl Renderer for PlantUmlRenderer {
    fn extension(&self) -> &'static str {
        "puml"
    }

    fn render(&self, view_name: &str, packages: &View) -> Result<String> {
        let mut out = String::new();
        self.write_document(&mut out, view_name, packages)?;
        Ok(out)
    }
}

/// Dotted prefix shared by every label, provided stripping it leaves each
/// label non-empty.
fn common_prefix<'a>(labels: impl Iterator<Item = &'a str>) -> Option<String> {
    let split: Vec<Vec<&str>> = labels.map(|label| label.split('.').collect()).collect();
    let first = split.first()?;

    let mut shared = first.len();
    for parts in &split[1..] {
        shared = shared.min(
            first
                .iter()
                .zip(parts)
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    if split.iter().any(|parts| parts.len() == shared) {
        shared = shared.saturating_sub(1);
    }

    (shared > 0).then(|| first[..shared].join("."))
}
