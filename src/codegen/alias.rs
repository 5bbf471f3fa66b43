//! Import alias resolution for generated code.
//!
//! Every import path gets the package name it would naturally be referred
//! to by. When two paths want the same name, the later one is numbered:
//!
//! ```text
//! example.com/a/models  →  models
//! example.com/b/models  →  models0
//! example.com/c/models  →  models1
//! ```
//!
//! Names the bootstrap imports itself are reserved up front.

use crate::analyze::{SourceInfo, default_package_name};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Alias of packages imported for side effects only.
pub const DISCARD: &str = "_";

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// import path → alias, iterated in import-path order
    aliases: BTreeMap<String, String>,
    /// Aliases in use (never contains `_`).
    used: FxHashSet<String>,
    /// Paths the templates import on their own.
    reserved: FxHashSet<String>,
}

impl AliasTable {
    /// Table pre-seeded with `flag`, `reflect`, the framework and its
    /// `testing` package.
    pub fn with_reserved(framework: &str) -> Self {
        let mut table = Self::default();
        let testing = format!("{framework}/testing");
        for (path, name) in [
            ("flag", "flag".to_string()),
            ("reflect", "reflect".to_string()),
            (framework, default_package_name(framework)),
            (testing.as_str(), "testing".to_string()),
        ] {
            table.add(path, &name);
            table.reserved.insert(path.to_string());
        }
        table
    }

    /// Assign `import_path` an alias based on `pkg_name`, keeping any
    /// alias it already has.
    pub fn add(&mut self, import_path: &str, pkg_name: &str) -> &str {
        if !self.aliases.contains_key(import_path) {
            let mut alias = pkg_name.to_string();
            let mut i = 0;
            while self.used.contains(&alias) {
                alias = format!("{pkg_name}{i}");
                i += 1;
            }
            self.used.insert(alias.clone());
            self.aliases.insert(import_path.to_string(), alias);
        }
        &self.aliases[import_path]
    }

    /// Import `import_path` for side effects unless it is already aliased.
    pub fn add_discard(&mut self, import_path: &str) {
        self.aliases
            .entry(import_path.to_string())
            .or_insert_with(|| DISCARD.to_string());
    }

    pub fn get(&self, import_path: &str) -> Option<&str> {
        self.aliases.get(import_path).map(String::as_str)
    }

    /// Alias for a path that was added during resolution.
    ///
    /// Falls back to the conventional package name, which only happens if
    /// the caller skipped [`resolve`] for that path.
    pub fn alias(&self, import_path: &str) -> String {
        self.get(import_path)
            .map(str::to_string)
            .unwrap_or_else(|| default_package_name(import_path))
    }

    /// Entries the generated file must import, in import-path order.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .filter(|(path, _)| !self.reserved.contains(*path))
            .map(|(path, alias)| (path.as_str(), alias.as_str()))
    }
}

/// Compute aliases for every package the bootstrap refers to.
pub fn resolve(info: &SourceInfo, framework: &str) -> AliasTable {
    let mut table = AliasTable::with_reserved(framework);

    for controller in &info.controllers {
        table.add(&controller.import_path, &controller.package_name);
        for method in &controller.methods {
            for arg in method.args.iter().filter(|a| !a.import_path.is_empty()) {
                table.add(&arg.import_path, &arg.type_expr.pkg_name);
            }
        }
    }
    for suite in &info.test_suites {
        table.add(&suite.import_path, &suite.package_name);
    }
    for path in &info.init_import_paths {
        table.add_discard(path);
    }

    table
}
