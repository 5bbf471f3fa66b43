//! Static analysis of the application's Go source.
//!
//! # Flow
//!
//! ```text
//! SourceRoot[] ──walk──▶ packages (sorted dirs, sorted files)
//!                           │ parse::parse_file (tree-sitter)
//!                           ▼
//!                   GoFile per file
//!                           │ resolve embedding to a fixpoint
//!                           ▼
//!                       SourceInfo
//! ```
//!
//! Output order follows the configured roots, then sorted directories and
//! files, then declaration order inside each file.

pub mod expr;
mod parse;

pub use expr::TypeExpr;
pub use parse::default_package_name;

use crate::error::{CompileError, CompileErrorKind};
use crate::{debug, log};
use jwalk::WalkDir;
use parse::{GoFile, GoParser, StructDecl};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Directories directly under a root that hold generated code.
const GENERATED_DIRS: &[&str] = &["tmp", "routes"];

const ANALYSIS_TITLE: &str = "Go Compilation Error";

/// A directory of Go code and the import path it lives at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub dir: PathBuf,
    pub import_path: String,
}

impl SourceRoot {
    pub fn new(dir: impl Into<PathBuf>, import_path: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            import_path: import_path.into(),
        }
    }
}

/// Everything the generator needs to know about the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub controllers: Vec<TypeInfo>,
    pub test_suites: Vec<TypeInfo>,
    /// Absolute file path → line → validation key.
    pub validation_keys: BTreeMap<String, BTreeMap<usize, String>>,
    /// Packages imported only for their `init()` side effects.
    pub init_import_paths: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub struct_name: String,
    pub import_path: String,
    pub package_name: String,
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub args: Vec<MethodArg>,
    /// Line of the closing parenthesis → names passed to `Render`.
    pub render_calls: BTreeMap<usize, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodArg {
    pub name: String,
    /// Empty for builtin types.
    pub import_path: String,
    pub type_expr: TypeExpr,
}

/// One Go package: a directory's worth of parsed files.
struct Package {
    import_path: String,
    name: String,
    files: Vec<(PathBuf, GoFile)>,
}

/// (import path, type name)
type TypeKey = (String, String);

/// Analyze every package under `roots`.
pub fn process_source(roots: &[SourceRoot], framework: &str) -> Result<SourceInfo, CompileError> {
    let mut parser = GoParser::new().map_err(|e| {
        CompileError::new(CompileErrorKind::Analysis, ANALYSIS_TITLE, format!("{e:#}"))
    })?;

    let mut packages = Vec::new();
    for root in roots {
        if !root.dir.is_dir() {
            debug!("analyze"; "skipping missing source root {}", root.dir.display());
            continue;
        }
        for (dir, files) in package_dirs(&root.dir) {
            if let Some(package) = parse_package(&mut parser, root, &dir, files, framework)? {
                packages.push(package);
            }
        }
    }

    Ok(resolve(&packages, framework))
}

/// Whether a path relative to a source root is outside the analyzed tree.
pub fn is_excluded(rel: &Path) -> bool {
    let mut components = rel.components().peekable();
    let mut first = true;
    while let Some(Component::Normal(name)) = components.next() {
        let is_dir = components.peek().is_some();
        let name = name.to_string_lossy();
        if is_dir {
            if first && GENERATED_DIRS.contains(&name.as_ref()) {
                return true;
            }
            if name.starts_with('.') || name.starts_with('_') || name == "testdata" {
                return true;
            }
        }
        first = false;
    }
    false
}

/// `.go` files under `root`, grouped by directory, both sorted.
fn package_dirs(root: &Path) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "go"))
        .filter(|p| p.strip_prefix(root).is_ok_and(|rel| !is_excluded(rel)))
        .collect();
    files.sort();

    let mut dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        if let Some(parent) = file.parent() {
            dirs.entry(parent.to_path_buf()).or_default().push(file);
        }
    }
    dirs
}

fn parse_package(
    parser: &mut GoParser,
    root: &SourceRoot,
    dir: &Path,
    files: Vec<PathBuf>,
    framework: &str,
) -> Result<Option<Package>, CompileError> {
    let import_path = match dir.strip_prefix(&root.dir) {
        Ok(rel) if rel.as_os_str().is_empty() => root.import_path.clone(),
        Ok(rel) => {
            let rel: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("{}/{}", root.import_path, rel.join("/"))
        }
        Err(_) => root.import_path.clone(),
    };

    let mut parsed = Vec::with_capacity(files.len());
    for path in files {
        let path = std::path::absolute(&path).unwrap_or(path);
        let display = path.display().to_string();

        let source = fs::read_to_string(&path).map_err(|e| {
            CompileError::new(CompileErrorKind::Analysis, ANALYSIS_TITLE, e.to_string())
                .with_location(display.clone(), 0)
        })?;

        let file = parse::parse_file(parser, &source, framework).map_err(|e| {
            let mut err = CompileError::new(CompileErrorKind::Analysis, ANALYSIS_TITLE, e.message)
                .with_location(display.clone(), e.line);
            err.column = Some(e.column);
            err.load_source(&path)
        })?;

        // External test packages are compiled by `go test`, never by the app.
        if file.package.ends_with("_test") {
            continue;
        }
        parsed.push((path, file));
    }

    let Some(name) = parsed.first().map(|(_, f)| f.package.clone()) else {
        return Ok(None);
    };
    Ok(Some(Package {
        import_path,
        name,
        files: parsed,
    }))
}

/// Resolve an embedded field to the key of the type it names.
fn embedded_key(package: &Package, file: &GoFile, qualifier: Option<&str>, name: &str) -> Option<TypeKey> {
    match qualifier {
        None => Some((package.import_path.clone(), name.to_string())),
        Some(q) => file.import_for(q).map(|path| (path.to_string(), name.to_string())),
    }
}

/// Every struct transitively embedding `base`.
fn embedding_closure(structs: &[(TypeKey, Vec<TypeKey>)], base: TypeKey) -> FxHashSet<TypeKey> {
    let mut found = FxHashSet::default();
    found.insert(base);
    loop {
        let mut changed = false;
        for (key, embeds) in structs {
            if !found.contains(key) && embeds.iter().any(|e| found.contains(e)) {
                found.insert(key.clone());
                changed = true;
            }
        }
        if !changed {
            return found;
        }
    }
}

fn resolve(packages: &[Package], framework: &str) -> SourceInfo {
    // All structs in source order, with embedded types resolved.
    let mut decls: Vec<(&Package, &StructDecl)> = Vec::new();
    let mut keyed: Vec<(TypeKey, Vec<TypeKey>)> = Vec::new();
    for package in packages {
        for (_, file) in &package.files {
            for decl in &file.structs {
                let embeds = decl
                    .embedded
                    .iter()
                    .filter_map(|(q, name)| embedded_key(package, file, q.as_deref(), name))
                    .collect();
                keyed.push(((package.import_path.clone(), decl.name.clone()), embeds));
                decls.push((package, decl));
            }
        }
    }

    let controller_base = (framework.to_string(), "Controller".to_string());
    let suite_base = (format!("{framework}/testing"), "TestSuite".to_string());
    let controllers = embedding_closure(&keyed, controller_base);
    let suites = embedding_closure(&keyed, suite_base);

    let mut info = SourceInfo::default();
    for ((key, _), (package, decl)) in keyed.iter().zip(&decls) {
        if controllers.contains(key) {
            info.controllers.push(TypeInfo {
                struct_name: decl.name.clone(),
                import_path: package.import_path.clone(),
                package_name: package.name.clone(),
                methods: action_methods(package, &decl.name),
            });
        }
        if suites.contains(key) {
            info.test_suites.push(TypeInfo {
                struct_name: decl.name.clone(),
                import_path: package.import_path.clone(),
                package_name: package.name.clone(),
                methods: Vec::new(),
            });
        }
    }

    for package in packages {
        for (path, file) in &package.files {
            if !file.validation_keys.is_empty() {
                info.validation_keys
                    .entry(path.display().to_string())
                    .or_default()
                    .extend(file.validation_keys.clone());
            }
            if file.has_init {
                info.init_import_paths.insert(package.import_path.clone());
            }
        }
    }

    info
}

/// Exported methods of `struct_name` whose arguments can all be named.
fn action_methods(package: &Package, struct_name: &str) -> Vec<MethodSpec> {
    let mut methods = Vec::new();
    for (path, file) in &package.files {
        'method: for method in file.methods.iter().filter(|m| m.receiver == struct_name) {
            if !method.name.starts_with(|c: char| c.is_ascii_uppercase()) {
                continue;
            }
            let Some(params) = &method.params else {
                log!("analyze"; "skipping {struct_name}.{}: unnamed parameter", method.name);
                continue;
            };

            let mut args = Vec::with_capacity(params.len());
            for param in params {
                if !param.ty.valid {
                    log!(
                        "analyze";
                        "skipping {struct_name}.{}: unsupported type `{}` for `{}`",
                        method.name, param.ty.expr, param.name
                    );
                    continue 'method;
                }
                let import_path = if param.ty.is_builtin() {
                    String::new()
                } else if param.ty.pkg_name == package.name {
                    package.import_path.clone()
                } else if let Some(path) = file.import_for(&param.ty.pkg_name) {
                    path.to_string()
                } else {
                    log!(
                        "analyze";
                        "skipping {struct_name}.{}: no import for `{}` in {}",
                        method.name, param.ty.pkg_name, path.display()
                    );
                    continue 'method;
                };
                args.push(MethodArg {
                    name: param.name.clone(),
                    import_path,
                    type_expr: param.ty.clone(),
                });
            }

            methods.push(MethodSpec {
                name: method.name.clone(),
                args,
                render_calls: method.render_calls.clone(),
            });
        }
    }
    methods
}

#[cfg(test)]
mod tests;
