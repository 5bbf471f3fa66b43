//! `gospf build`: one build, no supervision.

use crate::build::{Builder, GoToolchain};
use crate::config::HarnessConfig;
use crate::log;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the application and return the binary path.
pub fn build_app(config: Arc<HarnessConfig>) -> Result<PathBuf> {
    let toolchain = GoToolchain::locate()?;
    log!("build"; "building {} ({})", config.app_name(), config.import_path);

    let builder = Builder::new(config, Arc::new(toolchain));
    let app = builder.build()?;
    Ok(app.bin_path.clone())
}
