//! AST visitors used by the source analyzer.

mod import_discovery;

pub use import_discovery::{DiscoveredImport, ImportDiscoveryVisitor, discover_imports};
