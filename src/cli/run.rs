//! `gospf run`: the harness in watched mode, else build and run once.

use crate::build::{Builder, GoToolchain};
use crate::config::HarnessConfig;
use crate::harness::{self, Harness};
use crate::log;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub fn run_app(config: HarnessConfig) -> Result<()> {
    log!(
        "harness";
        "running {} ({}) in {} mode",
        config.app_name(),
        config.import_path,
        config.run_mode
    );
    let config = Arc::new(config);

    if config.is_watched() {
        let harness = Harness::new(Arc::clone(&config))?;
        return harness::serve(Arc::new(harness));
    }
    run_once(config)
}

/// Build, then run the app on the public port until it exits or Ctrl+C.
fn run_once(config: Arc<HarnessConfig>) -> Result<()> {
    let toolchain = GoToolchain::locate()?;
    let builder = Builder::new(Arc::clone(&config), Arc::new(toolchain));
    let mut app = builder.build()?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to set Ctrl+C handler")?;

    app.start(
        config.http.port,
        Duration::from_secs(config.harness.startup_timeout),
    )?;
    match app.wait(&stop) {
        Some(status) => log!("app"; "exited with {status}"),
        None => {
            log!("app"; "shutting down...");
            app.kill();
        }
    }
    Ok(())
}
