//! Build-time and fatal error types.
//!
//! Every failure between "a file changed" and "the new app is listening"
//! becomes a [`CompileError`]. The harness renders it as an error page and
//! keeps serving. [`HarnessError`] is reserved for conditions under which no
//! request could ever be served.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source type shown on error pages.
pub const GO_SOURCE: &str = "Go code";

/// Which stage of a build attempt produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Source file could not be read or parsed.
    Analysis,
    /// Generated bootstrap could not be written.
    Generate,
    /// A missing package could not be fetched (or was still missing after fetching).
    ImportNotFound,
    /// Toolchain diagnostic with a file and line.
    Diagnostic,
    /// Toolchain output matched no known diagnostic format.
    Unparseable,
    /// The compiled app failed to launch or never started listening.
    ProcessStart,
}

/// A structured build failure, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub source_type: String,
    pub title: String,
    /// Path as reported (relative to the app root for toolchain output).
    pub path: String,
    pub abs_path: Option<PathBuf>,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    pub column: Option<usize>,
    pub description: String,
    /// Full content of the offending file, one entry per line.
    pub source_lines: Vec<String>,
    pub link: Option<String>,
    /// Why the source could not be loaded, if it couldn't.
    pub meta_error: Option<String>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            source_type: GO_SOURCE.to_string(),
            title: title.into(),
            path: String::new(),
            abs_path: None,
            line: 0,
            column: None,
            description: description.into(),
            source_lines: Vec::new(),
            link: None,
            meta_error: None,
        }
    }

    /// Error raised while the app binary is being started.
    pub fn process_start(description: impl Into<String>) -> Self {
        Self::new(
            CompileErrorKind::ProcessStart,
            "App failed to start up",
            description,
        )
    }

    pub fn with_location(mut self, path: impl Into<String>, line: usize) -> Self {
        self.path = path.into();
        self.line = line;
        self
    }

    /// Load the offending file so the error page can show context.
    ///
    /// A read failure is recorded in `meta_error` instead of failing.
    pub fn load_source(mut self, abs_path: &Path) -> Self {
        match std::fs::read_to_string(abs_path) {
            Ok(content) => {
                self.source_lines = content.lines().map(str::to_string).collect();
            }
            Err(e) => {
                self.meta_error = Some(format!("{}: {e}", abs_path.display()));
            }
        }
        self.abs_path = Some(abs_path.to_path_buf());
        self
    }

    /// Fill the deep link from a template such as `vscode://file/{{Path}}:{{Line}}`.
    pub fn set_link(&mut self, template: &str) {
        let path = self
            .abs_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.path.clone());
        self.link = Some(
            template
                .replace("{{Path}}", &path)
                .replace("{{Line}}", &self.line.to_string()),
        );
    }

    pub fn is_located(&self) -> bool {
        !self.path.is_empty() && self.line > 0
    }

    /// Lines around the error line, as `(1-based line number, text)` pairs.
    pub fn context_lines(&self, radius: usize) -> Vec<(usize, &str)> {
        if self.line == 0 || self.source_lines.is_empty() {
            return Vec::new();
        }
        let start = self.line.saturating_sub(radius).max(1);
        let end = (self.line + radius).min(self.source_lines.len());
        (start..=end)
            .filter_map(|n| self.source_lines.get(n - 1).map(|text| (n, text.as_str())))
            .collect()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if self.is_located() {
            write!(f, " in {}:{}", self.path, self.line)?;
        }
        if !self.description.is_empty() {
            write!(f, ": {}", self.description)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Conditions that abort the whole harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("`{0}` executable not found in PATH")]
    ToolchainMissing(&'static str),

    #[error("failed to bind {addr}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("no free port for the app")]
    NoFreePort(#[source] std::io::Error),

    #[error("failed to set up the TLS client for the app")]
    BackendTls(#[source] native_tls::Error),

    #[error("failed to load TLS certificate `{cert}` / key `{key}`")]
    Tls {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn located() -> CompileError {
        CompileError::new(CompileErrorKind::Diagnostic, "Go Compilation Error", "undefined: x")
            .with_location("app/controllers/app.go", 3)
    }

    #[test]
    fn test_display_includes_location() {
        let display = located().to_string();
        assert_eq!(
            display,
            "Go Compilation Error in app/controllers/app.go:3: undefined: x"
        );
    }

    #[test]
    fn test_load_source_and_context() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.go");
        std::fs::write(&file, "a\nb\nc\nd\ne\n").unwrap();

        let err = located().load_source(&file);
        assert_eq!(err.source_lines.len(), 5);
        assert!(err.meta_error.is_none());
        assert_eq!(err.context_lines(1), vec![(2, "b"), (3, "c"), (4, "d")]);
        assert_eq!(err.context_lines(10).len(), 5);
    }

    #[test]
    fn test_load_source_missing_file_sets_meta_error() {
        let err = located().load_source(Path::new("/nonexistent/app.go"));
        assert!(err.source_lines.is_empty());
        assert!(err.meta_error.unwrap().contains("/nonexistent/app.go"));
    }

    #[test]
    fn test_set_link() {
        let mut err = located();
        err.set_link("vscode://file/{{Path}}:{{Line}}");
        assert_eq!(
            err.link.as_deref(),
            Some("vscode://file/app/controllers/app.go:3")
        );
    }

    #[test]
    fn test_unlocated_error_has_no_context() {
        let err = CompileError::new(CompileErrorKind::Unparseable, "Go Compilation Error", "See console");
        assert!(!err.is_located());
        assert!(err.context_lines(5).is_empty());
        assert_eq!(err.to_string(), "Go Compilation Error: See console");
    }
}
