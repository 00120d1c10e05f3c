//! View-scoped projections of the project model.
//!
//! A [`View`] is rebuilt from the model for every evaluation: the filter
//! selects packages and rolls excluded ones up into their included ancestors,
//! the diff engine annotates two views of the same specification, and a
//! renderer turns the result into text. Views never point back into the
//! model except through [`ViewPackage::origin`].

mod diff;
mod filter;
mod names;

use std::collections::BTreeMap;

use serde::Serialize;

pub use diff::{Change, DiffView, diff};
pub use filter::{filter_view, validate_view_spec};
pub use names::apply_labels;

use crate::project_model::PackageId;

/// Packages of one view, keyed and ordered by their path.
pub type View = BTreeMap<String, ViewPackage>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityState {
    #[default]
    Neutral,
    Created,
    Deleted,
}

/// How an edge differs between the two sides of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeChange {
    Created,
    Deleted,
    CountChanged,
}

/// Rendering instructions for a dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DependencyRender {
    /// Drawn with its plain dependency count
    #[default]
    Normal,
    /// Drawn with a diff annotation such as `3 (+1)`
    DiffAnnotated {
        change: EdgeChange,
        delta: i64,
        label: String,
    },
}

impl DependencyRender {
    pub fn is_annotated(&self) -> bool {
        matches!(self, Self::DiffAnnotated { .. })
    }
}

/// One underlying file-level import of a view dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileRelation {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDependency {
    pub source: String,
    pub destination: String,
    /// Number of file-level edges folded into this dependency
    pub count: usize,
    pub relations: Vec<FileRelation>,
    pub state: EntityState,
    pub render: DependencyRender,
}

impl ViewDependency {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            count: 0,
            relations: Vec::new(),
            state: EntityState::Neutral,
            render: DependencyRender::Normal,
        }
    }

    /// State the dependency is drawn with. Annotated edges show whether the
    /// dependency grew or shrank.
    pub fn display_state(&self) -> EntityState {
        match &self.render {
            DependencyRender::Normal => self.state,
            DependencyRender::DiffAnnotated { change, delta, .. } => match change {
                EdgeChange::Created => EntityState::Created,
                EdgeChange::Deleted => EntityState::Deleted,
                EdgeChange::CountChanged if *delta > 0 => EntityState::Created,
                EdgeChange::CountChanged => EntityState::Deleted,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPackage {
    /// Slash-separated path relative to the project root
    pub path: String,
    /// Canonical dotted name
    pub name: String,
    /// Name shown in diagrams
    pub label: String,
    pub state: EntityState,
    /// Outgoing dependencies, ordered by destination
    pub dependencies: Vec<ViewDependency>,
    /// Package this entry was built from, in the model the view came from
    pub origin: PackageId,
}

impl ViewPackage {
    pub fn dependency(&self, destination: &str) -> Option<&ViewDependency> {
        self.dependencies
            .iter()
            .find(|dependency| dependency.destination == destination)
    }
}
