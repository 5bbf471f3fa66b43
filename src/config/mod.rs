//! Application configuration from `conf/app.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # [app] [http] [harness] [build] [watch] [error]
//! ├── types/     # ConfigError
//! ├── gopath.rs  # GOPATH / go.mod lookups
//! └── mod.rs     # HarnessConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[app]`     | Name, import path, framework path, extra modules |
//! | `[http]`    | Public listener address, port, TLS               |
//! | `[harness]` | Port of the supervised app, startup timeout      |
//! | `[build]`   | Build tags, db import, binary directory          |
//! | `[watch]`   | Watched mode switches and detection mode         |
//! | `[error]`   | Deep link template for error pages               |

pub mod gopath;
pub mod section;
pub mod types;

pub use section::{
    AppSection, BuildSection, ErrorSection, HarnessSection, HttpSection, ModuleConfig,
    WatchMode, WatchSection,
};
pub use types::ConfigError;

use crate::analyze::SourceRoot;
use crate::log;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config location, relative to the application root.
pub const DEFAULT_CONFIG: &str = "conf/app.toml";

/// Default run mode.
pub const DEFAULT_MODE: &str = "dev";

/// Root configuration structure representing `conf/app.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Application root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Resolved Go import path of the application (internal use only)
    #[serde(skip)]
    pub import_path: String,

    /// Run mode passed to the app (internal use only)
    #[serde(skip)]
    pub run_mode: String,

    #[serde(default)]
    pub app: AppSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub harness: HarnessSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub error: ErrorSection,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            config_path: PathBuf::new(),
            import_path: String::new(),
            run_mode: DEFAULT_MODE.to_string(),
            app: AppSection::default(),
            http: HttpSection::default(),
            harness: HarnessSection::default(),
            build: BuildSection::default(),
            watch: WatchSection::default(),
            error: ErrorSection::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration for the application at `root`.
    ///
    /// A missing config file yields the defaults. `requested` is the app
    /// argument given on the command line, used as the last-resort import path.
    pub fn load(root: &Path, config_path: &Path, run_mode: &str, requested: &str) -> Result<Self> {
        let config_path = if config_path.is_absolute() {
            config_path.to_path_buf()
        } else {
            root.join(config_path)
        };

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        config.root = root.to_path_buf();
        config.config_path = config_path;
        config.run_mode = run_mode.to_string();
        config.import_path = gopath::resolve_import_path(
            root,
            config.app.import_path.as_deref(),
            requested,
        );
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (config, ignored) =
            Self::parse_with_ignored(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        log!("warn"; "unknown fields in {} (ignored): {}", path.display(), fields.join(", "));
    }

    /// Expand `~` in user-supplied paths.
    fn expand_paths(&mut self) {
        fn expand(path: &Path) -> PathBuf {
            let raw = path.to_string_lossy();
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        }

        self.http.ssl_cert = expand(&self.http.ssl_cert);
        self.http.ssl_key = expand(&self.http.ssl_key);
        if let Some(dir) = &self.build.bin_dir {
            self.build.bin_dir = Some(expand(dir));
        }
        for module in &mut self.app.modules {
            module.dir = expand(&module.dir);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.ssl
            && (self.http.ssl_cert.as_os_str().is_empty() || self.http.ssl_key.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid {
                section: "http",
                message: "ssl = true requires ssl_cert and ssl_key".to_string(),
            });
        }
        if self.harness.startup_timeout == 0 {
            return Err(ConfigError::Invalid {
                section: "harness",
                message: "startup_timeout must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Application name: `[app] name`, else the root directory name.
    pub fn app_name(&self) -> String {
        self.app.name.clone().unwrap_or_else(|| self.base_name())
    }

    /// Base name of the application root.
    pub fn base_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }

    /// `<root>/app`, the application's own code.
    pub fn app_path(&self) -> PathBuf {
        self.root.join("app")
    }

    /// Directory receiving the generated entry point.
    pub fn tmp_dir(&self) -> PathBuf {
        self.app_path().join("tmp")
    }

    /// Directory receiving the generated reverse-route helper.
    pub fn routes_dir(&self) -> PathBuf {
        self.app_path().join("routes")
    }

    /// Directory the import path is relative to, passed to the app as `-srcPath`.
    ///
    /// `GOPATH/src` for a GOPATH checkout, else the root's parent.
    pub fn src_path(&self) -> PathBuf {
        if !self.import_path.is_empty() && self.root.ends_with(&self.import_path) {
            let mut path = self.root.clone();
            for _ in Path::new(&self.import_path).components() {
                path.pop();
            }
            return path;
        }
        self.root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }

    /// Import path of the generated entry point package.
    pub fn main_import_path(&self) -> String {
        format!("{}/app/tmp", self.import_path)
    }

    /// Every source root the analyzer reads, app first then modules.
    pub fn code_paths(&self) -> Vec<SourceRoot> {
        let mut roots = vec![SourceRoot::new(
            self.app_path(),
            format!("{}/app", self.import_path),
        )];
        for module in &self.app.modules {
            let dir = if module.dir.is_absolute() {
                module.dir.clone()
            } else {
                self.root.join(&module.dir)
            };
            roots.push(SourceRoot::new(
                dir.join("app"),
                format!("{}/app", module.import_path),
            ));
        }
        roots
    }

    /// Directories the watcher observes.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if self.watch.gopath {
            paths.extend(gopath::gopath_entries());
        }
        paths.extend(self.code_paths().into_iter().map(|root| root.dir));
        paths
    }

    /// Whether `run` should go through the harness.
    pub fn is_watched(&self) -> bool {
        self.watch.enabled && self.watch.code
    }

    /// Host the supervised app is reached at.
    pub fn backend_host(&self) -> &str {
        if self.http.addr.is_empty() {
            "localhost"
        } else {
            &self.http.addr
        }
    }

    /// Address of the harness listener.
    pub fn listen_addr(&self) -> String {
        let host = if self.http.addr.is_empty() {
            "0.0.0.0"
        } else {
            &self.http.addr
        };
        format!("{host}:{}", self.http.port)
    }
}

/// Parse a config snippet for tests, failing on unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> HarnessConfig {
    let (parsed, ignored) = HarnessConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
