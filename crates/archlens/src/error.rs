//! Typed errors surfaced by lookups and view specifications.
//!
//! Construction problems are never returned from here: a file that cannot be
//! parsed is logged and skipped by the builder, and an import that cannot be
//! resolved is dropped silently.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("package `{0}` could not be found")]
    PackageNotFound(String),

    #[error("file `{0}` could not be found")]
    FileNotFound(String),

    #[error("view `{view}` references `{path}`, which is not a package of this project")]
    UnknownViewPath { view: String, path: String },
}
