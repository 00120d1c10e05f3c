//! Diagram output.

mod json;
mod plantuml;

use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;

pub use json::JsonRenderer;
pub use plantuml::PlantUmlRenderer;

use crate::{config::Config, view::View};

/// Turns an evaluated view, or an annotated diff, into a document.
pub trait Renderer {
    /// File extension of the produced document, without the dot
    fn extension(&self) -> &'static str;

    fn render(&self, view_name: &str, packages: &View) -> Result<String>;
}

/// Document format written by the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[clap(rename_all = "kebab_case")]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "plantuml")]
    #[value(name = "plantuml")]
    PlantUml,
    Json,
}

impl OutputFormat {
    pub fn renderer(self, config: &Config) -> Box<dyn Renderer> {
        match self {
            Self::PlantUml => Box::new(PlantUmlRenderer::from_config(config)),
            Self::Json => Box::new(JsonRenderer::from_config(config)),
        }
    }
}

fn diagram_title(project_name: &str, view_name: &str) -> String {
    format!("{project_name}-{view_name}")
}

/// Label of the package at `path`, or the path itself for an unknown package.
fn label_of<'a>(packages: &'a View, path: &'a str) -> &'a str {
    packages
        .get(path)
        .map_or(path, |package| package.label.as_str())
}
