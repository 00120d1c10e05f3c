//! Import discovery visitor that finds all imports in a Python module,
//! including those nested within functions, classes, and other scopes.

use ruff_python_ast::{
    ModModule, Stmt, StmtImport, StmtImportFrom,
    visitor::{Visitor, walk_stmt},
};

/// An import discovered during AST traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImport {
    /// The module being imported (`None` for `from . import x`)
    pub module_name: Option<String>,
    /// Names being imported (for from imports)
    pub names: Vec<(String, Option<String>)>, // (name, alias)
    /// Import level for relative imports
    pub level: u32,
}

impl DiscoveredImport {
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }

    /// `from x import y` always carries at least one name; `import x` none.
    pub fn is_from_import(&self) -> bool {
        !self.names.is_empty()
    }
}

/// Visitor that discovers all imports in a Python module
#[derive(Debug, Default)]
pub struct ImportDiscoveryVisitor {
    imports: Vec<DiscoveredImport>,
}

impl ImportDiscoveryVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all discovered imports
    pub fn into_imports(self) -> Vec<DiscoveredImport> {
        self.imports
    }

    /// Record an import statement; `import a, b` yields one entry per alias
    fn record_import(&mut self, stmt: &StmtImport) {
        self.imports
            .extend(stmt.names.iter().map(|alias| DiscoveredImport {
                module_name: Some(alias.name.to_string()),
                names: Vec::new(),
                level: 0,
            }));
    }

    /// Record a from import statement
    fn record_import_from(&mut self, stmt: &StmtImportFrom) {
        let names = stmt
            .names
            .iter()
            .map(|alias| {
                (
                    alias.name.to_string(),
                    alias.asname.as_ref().map(ToString::to_string),
                )
            })
            .collect();

        self.imports.push(DiscoveredImport {
            module_name: stmt.module.as_ref().map(ToString::to_string),
            names,
            level: stmt.level,
        });
    }
}

impl<'a> Visitor<'a> for ImportDiscoveryVisitor {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Import(import_stmt) => self.record_import(import_stmt),
            Stmt::ImportFrom(import_from) => self.record_import_from(import_from),
            _ => walk_stmt(self, stmt),
        }
    }
}

/// Collect every import statement of a module, in source order.
pub fn discover_imports(module: &ModModule) -> Vec<DiscoveredImport> {
    let mut visitor = ImportDiscoveryVisitor::new();
    visitor.visit_body(&module.body);
    visitor.into_imports()
}

#[cfg(test)]
mod tests {
    use ruff_python_parser::parse_module;

    use super::*;

    fn imports_of(source: &str) -> Vec<DiscoveredImport> {
        let parsed = parse_module(source).expect("Failed to parse test module");
        discover_imports(parsed.syntax())
    }

    #[test]
    fn test_module_level_import() {
        let imports = imports_of(
            r#"
import os
from sys import path
"#,
        );

        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module_name, Some("os".to_string()));
        assert!(imports[0].names.is_empty());
        assert_eq!(imports[1].module_name, Some("sys".to_string()));
        assert_eq!(imports[1].names, vec![("path".to_string(), None)]);
    }

    #[test]
    fn test_multi_name_import_is_split() {
        let imports = imports_of("import api.views, core as c\n");

        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module_name.as_deref(), Some("api.views"));
        assert_eq!(imports[1].module_name.as_deref(), Some("core"));
        assert!(imports.iter().all(|import| import.names.is_empty()));
    }

    #[test]
    fn test_relative_import_level() {
        let imports = imports_of(
            r#"
from . import models
from ..core.config import Settings as S
"#,
        );

        assert_eq!(imports.len(), 2);
        assert!(imports[0].is_relative());
        assert_eq!(imports[0].level, 1);
        assert_eq!(imports[0].module_name, None);
        assert_eq!(imports[0].names, vec![("models".to_string(), None)]);
        assert_eq!(imports[1].level, 2);
        assert_eq!(imports[1].module_name.as_deref(), Some("core.config"));
        assert_eq!(
            imports[1].names,
            vec![("Settings".to_string(), Some("S".to_string()))]
        );
    }

    fn module_names(imports: &[DiscoveredImport]) -> Vec<&str> {
        imports
            .iter()
            .map(|import| import.module_name.as_deref().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_function_scoped_import() {
        let imports = imports_of(
            r#"
def my_function():
    import json
    from datetime import datetime
    return json.dumps({})
"#,
        );

        assert_eq!(module_names(&imports), vec!["json", "datetime"]);
        assert_eq!(imports[1].names, vec![("datetime".to_string(), None)]);
    }

    #[test]
    fn test_conditional_import() {
        let imports = imports_of(
            r#"
if True:
    import platform
    if platform.system() == "Windows":
        import winreg
"#,
        );

        assert_eq!(module_names(&imports), vec!["platform", "winreg"]);
    }

    #[test]
    fn test_try_and_with_blocks() {
        let imports = imports_of(
            r#"
try:
    import ujson as json
except ImportError:
    import json

with open("x") as f:
    from core import loader
"#,
        );

        assert_eq!(module_names(&imports), vec!["ujson", "json", "core"]);
    }

    #[test]
    fn test_nested_scopes() {
        let imports = imports_of(
            r#"
class MyClass:
    def method(self):
        from collections import defaultdict

        def nested_function():
            for _ in range(2):
                from ..api import views
            return views
        return nested_function()
"#,
        );

        assert_eq!(module_names(&imports), vec!["collections", "api"]);
        assert_eq!(imports[1].level, 2);
        assert_eq!(imports[1].names, vec![("views".to_string(), None)]);
    }
}
