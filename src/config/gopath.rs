//! GOPATH and `go.mod` lookups.
//!
//! The application's import path is resolved in order:
//!
//! 1. `[app] import_path` in the config file
//! 2. the `module` line of `<root>/go.mod`
//! 3. the root's position under a `GOPATH/src` entry
//! 4. the app argument given on the command line

use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Every GOPATH entry, defaulting to `~/go` like the toolchain does.
pub fn gopath_entries() -> Vec<PathBuf> {
    match env::var_os("GOPATH") {
        Some(value) if !value.is_empty() => env::split_paths(&value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
        _ => vec![default_gopath()],
    }
}

fn default_gopath() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/go").into_owned())
}

/// Locate `<entry>/src/<import_path>` in the first GOPATH entry that has it.
pub fn find_in_gopath(import_path: &str) -> Option<PathBuf> {
    find_in_entries(&gopath_entries(), import_path)
}

fn find_in_entries(entries: &[PathBuf], import_path: &str) -> Option<PathBuf> {
    entries
        .iter()
        .map(|entry| entry.join("src").join(import_path))
        .find(|dir| dir.is_dir())
}

/// Resolve the import path of the application rooted at `root`.
pub fn resolve_import_path(root: &Path, configured: Option<&str>, requested: &str) -> String {
    resolve_with_entries(root, configured, requested, &gopath_entries())
}

fn resolve_with_entries(
    root: &Path,
    configured: Option<&str>,
    requested: &str,
    entries: &[PathBuf],
) -> String {
    if let Some(path) = configured.filter(|p| !p.is_empty()) {
        return path.trim_end_matches('/').to_string();
    }
    if let Some(module) = module_path(root) {
        return module;
    }
    if let Some(path) = import_path_in_gopath(root, entries) {
        return path;
    }
    requested.trim_end_matches('/').to_string()
}

/// Read the `module` directive of `<root>/go.mod`.
pub fn module_path(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join("go.mod")).ok()?;
    parse_module_directive(&content)
}

fn parse_module_directive(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest.trim().trim_matches('"').trim_matches('`');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Import path of `root` relative to a GOPATH `src` directory.
fn import_path_in_gopath(root: &Path, entries: &[PathBuf]) -> Option<String> {
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    entries.iter().find_map(|entry| {
        let src = entry.join("src");
        let src = fs::canonicalize(&src).unwrap_or(src);
        let rel = root.strip_prefix(&src).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    })
}

/// Directory receiving compiled binaries.
///
/// `[build] bin_dir`, then `$GOBIN`, then `<first GOPATH>/bin`.
pub fn bin_dir(configured: Option<&Path>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    if let Some(gobin) = env::var_os("GOBIN").filter(|v| !v.is_empty()) {
        return PathBuf::from(gobin);
    }
    gopath_entries()
        .into_iter()
        .next()
        .unwrap_or_else(default_gopath)
        .join("bin")
}
