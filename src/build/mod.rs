//! One build attempt: analyze → generate → compile.
//!
//! ```text
//! clean ─▶ analyze ─▶ generate ─▶ go build ──ok──▶ App
//!                                    │
//!                       missing pkg? ├──▶ go get ─▶ retry (once per package)
//!                                    └──▶ diagnostic ─▶ CompileError
//! ```

pub mod diagnostic;
pub mod toolchain;
pub mod version;

pub use toolchain::{BuildArgs, GoToolchain, Toolchain};

use crate::analyze::{self, SourceInfo};
use crate::app::App;
use crate::codegen;
use crate::config::{HarnessConfig, gopath};
use crate::error::{CompileError, CompileErrorKind};
use crate::{debug, log};
use diagnostic::Diagnostic;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const COMPILE_TITLE: &str = "Go Compilation Error";
const SEE_CONSOLE: &str = "See console for build error.";

/// Directory under `bin_dir` holding harness-built binaries.
const BIN_SUBDIR: &str = "gospf.d";

pub struct Builder {
    config: Arc<HarnessConfig>,
    toolchain: Arc<dyn Toolchain>,
}

impl Builder {
    pub fn new(config: Arc<HarnessConfig>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self { config, toolchain }
    }

    /// Run one full build attempt and return the (not yet started) app.
    pub fn build(&self) -> Result<App, CompileError> {
        let config = &*self.config;

        codegen::clean(config).map_err(|e| {
            CompileError::new(
                CompileErrorKind::Generate,
                "Failed to clean generated code",
                format!("{e:#}"),
            )
        })?;

        let info = self.analyze()?;
        codegen::generate(config, &info)?;

        let version = version::app_version(&config.root);
        let output = binary_path(config);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CompileError::new(
                    CompileErrorKind::Generate,
                    "Failed to create binary directory",
                    format!("{}: {e}", parent.display()),
                )
            })?;
        }

        let args = BuildArgs {
            ldflags: version_ldflags(&config.import_path, &version),
            tags: config.build.tags.clone(),
            output: output.clone(),
            package: config.main_import_path(),
        };
        self.compile(&args)?;

        debug!("build"; "built {}", output.display());
        Ok(App::new(output, config))
    }

    fn analyze(&self) -> Result<SourceInfo, CompileError> {
        let config = &*self.config;
        let mut info = analyze::process_source(&config.code_paths(), &config.app.framework)
            .map_err(|e| self.with_link(e))?;
        if let Some(db) = config.build.db_import.as_ref().filter(|db| !db.is_empty()) {
            info.init_import_paths.insert(db.clone());
        }
        Ok(info)
    }

    /// Invoke the toolchain, fetching each missing package at most once.
    fn compile(&self, args: &BuildArgs) -> Result<(), CompileError> {
        let root = &self.config.root;
        let mut fetched = FxHashSet::default();

        loop {
            let output = self.toolchain.build(root, args).map_err(|e| {
                CompileError::new(CompileErrorKind::Unparseable, COMPILE_TITLE, format!("{e:#}"))
            })?;
            if output.success {
                return Ok(());
            }

            if let Some(package) = diagnostic::missing_package(&output.text) {
                if !fetched.insert(package.clone()) {
                    return Err(import_not_found(&package, "still missing after go get"));
                }
                log!("build"; "fetching missing package {package}");
                if let Err(e) = self.toolchain.fetch(root, &package) {
                    return Err(import_not_found(&package, &format!("{e:#}")));
                }
                continue;
            }

            log!("build"; "{}", output.text.trim_end());
            return Err(self.diagnostic_error(&output.text));
        }
    }

    fn diagnostic_error(&self, output: &str) -> CompileError {
        match diagnostic::parse(output) {
            Diagnostic::Located {
                path,
                line,
                column,
                message,
            } => {
                let abs = resolve_against(&self.config.root, &path);
                let mut err = CompileError::new(CompileErrorKind::Diagnostic, COMPILE_TITLE, message)
                    .with_location(path, line)
                    .load_source(&abs);
                err.column = column;
                self.with_link(err)
            }
            Diagnostic::Unparseable => {
                CompileError::new(CompileErrorKind::Unparseable, COMPILE_TITLE, SEE_CONSOLE)
            }
        }
    }

    fn with_link(&self, mut err: CompileError) -> CompileError {
        if let Some(link) = &self.config.error.link
            && err.is_located()
        {
            err.set_link(link);
        }
        err
    }
}

/// `-X` flag stamping `version`, quoted so go's flag splitter keeps it whole.
fn version_ldflags(import_path: &str, version: &str) -> String {
    let flag = format!("{import_path}/app.APP_VERSION={version}");
    if flag.contains('\'') {
        format!("-X \"{flag}\"")
    } else {
        format!("-X '{flag}'")
    }
}

fn import_not_found(package: &str, detail: &str) -> CompileError {
    CompileError::new(
        CompileErrorKind::ImportNotFound,
        "Failed to import package",
        format!("{package}: {detail}"),
    )
}

fn resolve_against(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Where `go build` writes the binary for `config`.
pub fn binary_path(config: &HarnessConfig) -> PathBuf {
    let bin_dir = gopath::bin_dir(config.build.bin_dir.as_deref());
    let goos = std::env::var("GOOS").ok();
    binary_path_for(&bin_dir, &config.import_path, &config.base_name(), goos.as_deref())
}

fn binary_path_for(bin_dir: &Path, import_path: &str, base_name: &str, goos: Option<&str>) -> PathBuf {
    let windows = match goos.filter(|os| !os.is_empty()) {
        Some(os) => os == "windows",
        None => cfg!(windows),
    };
    let name = if windows {
        format!("{base_name}.exe")
    } else {
        base_name.to_string()
    };
    bin_dir.join(BIN_SUBDIR).join(import_path).join(name)
}
