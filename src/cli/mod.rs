//! Command-line interface module.

mod args;
pub mod build;
pub mod clean;
pub mod run;

pub use args::{Cli, Commands};

use crate::config::{HarnessConfig, gopath};
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Locate the application named on the command line.
///
/// An existing directory wins; otherwise the argument is treated as an
/// import path and looked up under each `GOPATH/src`.
pub fn resolve_app_root(app: &str) -> Result<PathBuf> {
    let dir = Path::new(app);
    if dir.is_dir() {
        return Ok(std::path::absolute(dir)?);
    }
    match gopath::find_in_gopath(app) {
        Some(root) => Ok(root),
        None => bail!("cannot find application `{app}`: not a directory and not under any GOPATH"),
    }
}

/// Resolve and configure the application named on the command line.
pub fn load_app(cli: &Cli, app: &str, mode: &str) -> Result<HarnessConfig> {
    let root = resolve_app_root(app)?;
    // A directory argument is no import path; the root's name is the last resort.
    let requested = if Path::new(app).is_dir() {
        root.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        app.to_string()
    };
    HarnessConfig::load(&root, &cli.config, mode, &requested)
}
