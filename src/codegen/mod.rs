//! Go bootstrap generation.
//!
//! ```text
//! SourceInfo ──alias::resolve──▶ AliasTable
//!      │                              │
//!      └──────────┬───────────────────┘
//!                 ▼
//!   main_go::render   → app/tmp/main.go
//!   routes_go::render → app/routes/routes.go
//! ```
//!
//! Rendering is pure: identical input gives byte-identical output.

pub mod alias;
mod main_go;
mod routes_go;

pub use alias::AliasTable;

use crate::analyze::SourceInfo;
use crate::config::HarnessConfig;
use crate::error::{CompileError, CompileErrorKind};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Contents of both generated files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub main_go: String,
    pub routes_go: String,
}

/// Render both artifacts for `info`.
pub fn render(info: &SourceInfo, framework: &str) -> Generated {
    let aliases = alias::resolve(info, framework);
    Generated {
        main_go: main_go::render(info, &aliases, framework),
        routes_go: routes_go::render(info, &aliases, framework),
    }
}

/// Render and write the bootstrap into freshly recreated output directories.
pub fn generate(config: &HarnessConfig, info: &SourceInfo) -> Result<(), CompileError> {
    let generated = render(info, &config.app.framework);
    write_generated(&config.tmp_dir(), "main.go", &generated.main_go)
        .and_then(|()| write_generated(&config.routes_dir(), "routes.go", &generated.routes_go))
        .map_err(|e| {
            CompileError::new(
                CompileErrorKind::Generate,
                "Failed to write generated code",
                format!("{e:#}"),
            )
        })
}

fn write_generated(dir: &Path, name: &str, content: &str) -> Result<()> {
    remove_dir(dir)?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Remove the generated-output directories.
pub fn clean(config: &HarnessConfig) -> Result<()> {
    remove_dir(&config.tmp_dir())?;
    remove_dir(&config.routes_dir())
}

fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", dir.display())),
    }
}

/// Quote `s` as a Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
