//! The Go toolchain behind a trait, so builds can be driven by fakes.

use crate::error::HarnessError;
use crate::utils::exec::{Cmd, CmdOutput, FilterRule};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Progress noise printed by `go get`.
static GO_GET_FILTER: FilterRule = FilterRule::new(&["go: downloading", "go: finding"]);

/// Arguments of one `go build` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub ldflags: String,
    /// Passed as `-tags` when non-empty.
    pub tags: String,
    pub output: PathBuf,
    pub package: String,
}

pub trait Toolchain: Send + Sync {
    /// Compile; a failing compile is reported through [`CmdOutput::success`].
    fn build(&self, root: &Path, args: &BuildArgs) -> Result<CmdOutput>;

    /// Fetch a missing package.
    fn fetch(&self, root: &Path, package: &str) -> Result<()>;
}

/// The `go` executable found on `PATH`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    go: PathBuf,
}

impl GoToolchain {
    pub fn locate() -> Result<Self, HarnessError> {
        which::which("go")
            .map(|go| Self { go })
            .map_err(|_| HarnessError::ToolchainMissing("go"))
    }
}

impl Toolchain for GoToolchain {
    fn build(&self, root: &Path, args: &BuildArgs) -> Result<CmdOutput> {
        let mut cmd = Cmd::new(&self.go).args(["build", "-ldflags", args.ldflags.as_str()]);
        if !args.tags.is_empty() {
            cmd = cmd.args(["-tags", args.tags.as_str()]);
        }
        cmd.arg("-o")
            .arg(&args.output)
            .arg(&args.package)
            .cwd(root)
            .output()
    }

    fn fetch(&self, root: &Path, package: &str) -> Result<()> {
        Cmd::new(&self.go)
            .args(["get", package])
            .cwd(root)
            .filter(&GO_GET_FILTER)
            .run()
            .map(drop)
    }
}
