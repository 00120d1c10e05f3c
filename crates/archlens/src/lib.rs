//! Dependency graphs, architectural policies and view diffs for Python
//! projects.
//!
//! A [`ProjectModel`](project_model::ProjectModel) is built from a source tree
//! by the [`model_builder`], checked against declared policies, and projected
//! into filtered [`view`]s that can be diffed against another checkout and
//! rendered as PlantUML.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod import_resolver;
pub mod model_builder;
pub mod policy;
pub mod project_model;
pub mod render;
pub mod view;
pub mod visitors;
