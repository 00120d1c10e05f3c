//! JSON graphs for tooling that draws its own diagrams.

use anyhow::Result;
use serde::Serialize;

use super::{Renderer, diagram_title, label_of};
use crate::{
    config::Config,
    view::{DependencyRender, EntityState, FileRelation, View, ViewDependency},
};

/// Renders a view as `{title, packages, edges}`, with the file-level imports
/// behind every edge.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    project_name: String,
}

impl JsonRenderer {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.name.clone())
    }
}

#[derive(Debug, Serialize)]
struct JsonGraph<'a> {
    title: String,
    packages: Vec<JsonPackage<'a>>,
    edges: Vec<JsonEdge<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonPackage<'a> {
    name: &'a str,
    state: EntityState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEdge<'a> {
    state: EntityState,
    from_package: &'a str,
    to_package: &'a str,
    label: String,
    relations: Vec<JsonRelation<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonRelation<'a> {
    from_file: JsonFile<'a>,
    to_file: JsonFile<'a>,
}

#[derive(Debug, Serialize)]
struct JsonFile<'a> {
    name: &'a str,
    path: &'a str,
}

impl<'a> JsonFile<'a> {
    fn new(path: &'a str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        Self { name, path }
    }
}

fn edge<'a>(packages: &'a View, dependency: &'a ViewDependency) -> JsonEdge<'a> {
    let label = match &dependency.render {
        DependencyRender::Normal => dependency.count.to_string(),
        DependencyRender::DiffAnnotated { label, .. } => label.clone(),
    };
    JsonEdge {
        state: dependency.display_state(),
        from_package: label_of(packages, &dependency.source),
        to_package: label_of(packages, &dependency.destination),
        label,
        relations: dependency
            .relations
            .iter()
            .map(|FileRelation { from, to }| JsonRelation {
                from_file: JsonFile::new(from),
                to_file: JsonFile::new(to),
            })
            .collect(),
    }
}

impl Renderer for JsonRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, view_name: &str, packages: &View) -> Result<String> {
        let graph = JsonGraph {
            title: diagram_title(&self.project_name, view_name),
            packages: packages
                .values()
                .map(|package| JsonPackage {
                    name: &package.label,
                    state: package.state,
                })
                .collect(),
            edges: packages
                .values()
                .flat_map(|package| &package.dependencies)
                .map(|dependency| edge(packages, dependency))
                .collect(),
        };
        let mut out = serde_json::to_string_pretty(&graph)?;
        out.push('\n');
        Ok(out)
    }
}
