//! Configuration section definitions.
//!
//! | Module   | TOML Section            | Purpose                         |
//! |----------|-------------------------|---------------------------------|
//! | (here)   | `[app]`                 | Name, import path, modules      |
//! | (here)   | `[build]`               | Tags, db import, binary dir     |
//! | (here)   | `[error]`               | Error page deep links           |
//! | `http`   | `[http]`, `[harness]`   | Listener and supervised app     |
//! | `watch`  | `[watch]`               | Watched mode                    |

mod http;
mod watch;

pub use http::{HarnessSection, HttpSection};
pub use watch::{WatchMode, WatchSection};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default framework import path.
pub const DEFAULT_FRAMEWORK: &str = "github.com/hubply/gospf";

/// `[app]` section.
///
/// ```toml
/// [app]
/// name = "chat"
/// import_path = "github.com/example/chat"
///
/// [[app.modules]]
/// dir = "~/go/src/github.com/example/auth"
/// import_path = "github.com/example/auth"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Display name (defaults to the root directory name).
    pub name: Option<String>,

    /// Go import path of the application.
    /// Falls back to `go.mod`, then GOPATH, then the CLI argument.
    pub import_path: Option<String>,

    /// Import path of the web framework.
    pub framework: String,

    /// Extra code roots compiled into the app.
    pub modules: Vec<ModuleConfig>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            import_path: None,
            framework: DEFAULT_FRAMEWORK.to_string(),
            modules: Vec::new(),
        }
    }
}

/// A module whose `app/` directory is analyzed alongside the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub dir: PathBuf,
    pub import_path: String,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Passed to `go build -tags` when non-empty.
    pub tags: String,

    /// Package imported for side effects only (database drivers).
    pub db_import: Option<String>,

    /// Where `gospf.d/` binaries go (defaults to GOBIN / GOPATH/bin).
    pub bin_dir: Option<PathBuf>,
}

/// `[error]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorSection {
    /// Deep link template, `{{Path}}` and `{{Line}}` are substituted.
    pub link: Option<String>,
}
