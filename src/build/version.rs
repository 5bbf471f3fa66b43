//! Version string stamped into the binary via `-ldflags -X`.

use crate::log;
use crate::utils::exec::Cmd;
use std::path::Path;

/// Environment override for the version.
pub const VERSION_ENV: &str = "APP_VERSION";

/// `APP_VERSION`, else `git-<describe>` for a checkout, else empty.
pub fn app_version(root: &Path) -> String {
    let env = std::env::var(VERSION_ENV).ok();
    let git = which::which("git").ok();
    resolve(env.as_deref(), root, git.as_deref())
}

fn resolve(env: Option<&str>, root: &Path, git: Option<&Path>) -> String {
    if let Some(version) = env.filter(|v| !v.is_empty()) {
        return version.to_string();
    }
    let git_dir = root.join(".git");
    let Some(git) = git.filter(|_| git_dir.is_dir()) else {
        return String::new();
    };

    let output = Cmd::new(git)
        .arg(format!("--git-dir={}", git_dir.display()))
        .args(["describe", "--always", "--dirty"])
        .cwd(root)
        .run();
    match output {
        Ok(output) => {
            let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
            format!("git-{described}")
        }
        Err(e) => {
            log!("warn"; "cannot determine version from git: {e:#}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = which::which("git").ok();
        assert_eq!(resolve(Some("1.2.3"), dir.path(), git.as_deref()), "1.2.3");
    }

    #[test]
    fn test_no_checkout_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(None, dir.path(), Some(Path::new("git"))), "");
        assert_eq!(resolve(Some(""), dir.path(), None), "");
    }

    #[test]
    fn test_broken_checkout_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let Ok(git) = which::which("git") else {
            return;
        };
        assert_eq!(resolve(None, dir.path(), Some(&git)), "");
    }

    #[test]
    fn test_checkout_gets_git_prefix() {
        let Ok(git) = which::which("git") else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let git_cmd = |args: &[&str]| {
            Cmd::new(&git)
                .args(["-c", "user.name=gospf", "-c", "user.email=gospf@example.com"])
                .args(args)
                .cwd(dir.path())
                .run()
                .unwrap();
        };
        git_cmd(&["init", "-q"]);
        git_cmd(&["commit", "-q", "--allow-empty", "-m", "init"]);

        let version = resolve(None, dir.path(), Some(&git));
        assert!(version.starts_with("git-"), "{version}");
        assert!(version.len() > "git-".len());
    }
}
