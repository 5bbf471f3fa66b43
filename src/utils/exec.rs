//! Running `go` and `git`.
//!
//! ```ignore
//! // Fails unless the command exits successfully
//! Cmd::new("go").args(["get", "github.com/lib/pq"]).cwd(root).run()?;
//!
//! // A failing compile is data, not an error
//! let out = Cmd::new("go").args(["build", "-o", bin]).cwd(root).output()?;
//! if !out.success { diagnostic::parse(&out.text) }
//! ```

use crate::log;
use anyhow::{Context, Result};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output},
};

#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    quiet: Option<&'static FilterRule>,
}

/// Result of a command whose failure is not an error by itself.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub success: bool,
    /// stdout followed by stderr, lossily decoded.
    pub text: String,
}

impl Cmd {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Empty arguments are dropped, so optional flags can be passed as `""`.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter().fold(self, Cmd::arg)
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Drop matching stderr lines when echoing a successful run.
    pub fn filter(mut self, filter: &'static FilterRule) -> Self {
        self.quiet = Some(filter);
        self
    }

    /// Execute, failing unless the command exits successfully.
    ///
    /// stderr of a successful run is echoed under the program's name.
    pub fn run(self) -> Result<Output> {
        let name = self.name();
        let output = self.spawn()?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            anyhow::bail!(
                "`{name}` exited with {}{}",
                output.status,
                indented(stderr.trim())
            );
        }

        let shown = self
            .quiet
            .map_or_else(|| stderr.trim().to_string(), |f| f.keep(&stderr));
        if !shown.is_empty() {
            log!(&name; "{shown}");
        }
        Ok(output)
    }

    /// Execute and hand back the combined output either way.
    ///
    /// Only a failure to launch the program is an error.
    pub fn output(self) -> Result<CmdOutput> {
        let output = self.spawn()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CmdOutput {
            success: output.status.success(),
            text,
        })
    }

    /// File name of the program, for messages.
    fn name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    fn spawn(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.name()))
    }
}

fn indented(text: &str) -> String {
    text.lines().map(|line| format!("\n  {line}")).collect()
}

/// Line prefixes that are progress noise rather than information.
pub struct FilterRule {
    skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    fn skips(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p))
    }

    /// The lines of `output` worth showing.
    fn keep(&self, output: &str) -> String {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !self.skips(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
