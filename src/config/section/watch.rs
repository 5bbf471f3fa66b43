//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! enabled = true     # run through the harness
//! code = true        # rebuild on Go source changes
//! gopath = false     # also watch every GOPATH entry
//! mode = "events"    # OS notifications; "poll" rescans on each request
//! ```

use serde::{Deserialize, Serialize};

/// How the watcher detects changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Rescan file signatures on every notify.
    Poll,
    /// Rescan only after the OS reported a relevant event. Falls back to
    /// `Poll` when no OS watcher can be created.
    #[default]
    Events,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub enabled: bool,
    pub code: bool,
    pub gopath: bool,
    pub mode: WatchMode,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            code: true,
            gopath: false,
            mode: WatchMode::Events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WatchMode;
    use crate::config::test_parse_config;

    #[test]
    fn test_watch_defaults() {
        let config = test_parse_config("");
        assert!(config.watch.enabled);
        assert!(config.watch.code);
        assert!(!config.watch.gopath);
        assert_eq!(config.watch.mode, WatchMode::Events);
    }

    #[test]
    fn test_watch_code_disabled() {
        let config = test_parse_config("[watch]\ncode = false\nmode = \"poll\"\n");
        assert!(!config.is_watched());
        assert_eq!(config.watch.mode, WatchMode::Poll);
    }
}
