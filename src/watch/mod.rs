//! Change detection driving rebuilds.
//!
//! [`Watcher::notify`] is synchronous: it looks for changes since the last
//! call and, if there are any (or nothing has built yet), runs the
//! [`Listener`] before returning.
//!
//! ```text
//! Poll:   every call ──scan──▶ Snapshot diff
//! Events: notify ──▶ crossbeam rx ──drain──▶ relevant? ──scan──▶ Snapshot diff
//! ```

mod signature;

use signature::Snapshot;

use crate::config::WatchMode;
use crate::error::CompileError;
use crate::{debug, log};
use crossbeam::channel::{Receiver, unbounded};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};

/// Something that rebuilds and restarts the application.
pub trait Listener {
    fn refresh(&mut self) -> Result<(), CompileError>;
}

/// Which directories and files matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchFilter {
    /// Directory names skipped at any depth, along with hidden directories.
    pub skip_dirs: Vec<String>,
    /// Extensions (without the dot) of relevant files.
    pub extensions: Vec<String>,
}

impl WatchFilter {
    /// Go sources, skipping generated code and templates.
    pub fn go() -> Self {
        Self {
            skip_dirs: ["tmp", "views", "routes"].map(String::from).to_vec(),
            extensions: vec!["go".to_string()],
        }
    }

    pub fn skips_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_dirs.iter().any(|d| d == name)
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Whether `path`, somewhere under one of `roots`, passes the filter.
    fn matches_under(&self, roots: &[PathBuf], path: &Path) -> bool {
        let Some(rel) = roots.iter().find_map(|root| path.strip_prefix(root).ok()) else {
            return false;
        };
        let mut components: Vec<_> = rel.components().collect();
        components.pop();
        let in_skipped_dir = components
            .iter()
            .any(|c| self.skips_dir(&c.as_os_str().to_string_lossy()));
        !in_skipped_dir && (self.is_relevant(path) || path.extension().is_none())
    }
}

enum Detector {
    Poll,
    Events {
        rx: Receiver<notify::Result<notify::Event>>,
        /// Canonical roots, as notify reports resolved paths.
        roots: Vec<PathBuf>,
        // Dropping the watcher stops event delivery.
        _watcher: RecommendedWatcher,
    },
}

pub struct Watcher {
    roots: Vec<PathBuf>,
    filter: WatchFilter,
    detector: Detector,
    snapshot: Snapshot,
    /// Set until the first successful refresh.
    force_refresh: bool,
    last_error: Option<CompileError>,
}

impl Watcher {
    /// Start watching `roots`. Roots that do not exist are ignored.
    pub fn new(roots: Vec<PathBuf>, filter: WatchFilter, mode: WatchMode) -> Self {
        let detector = match mode {
            WatchMode::Poll => Detector::Poll,
            WatchMode::Events => match Self::subscribe(&roots) {
                Ok(detector) => detector,
                Err(e) => {
                    log!("watch"; "cannot watch for events ({e}), falling back to polling");
                    Detector::Poll
                }
            },
        };
        let snapshot = Snapshot::scan(&roots, &filter, &Snapshot::default());
        debug!("watch"; "watching {} files under {} roots", snapshot.file_count(), roots.len());

        Self {
            roots,
            filter,
            detector,
            snapshot,
            force_refresh: true,
            last_error: None,
        }
    }

    fn subscribe(roots: &[PathBuf]) -> notify::Result<Detector> {
        let (tx, rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        for root in roots.iter().filter(|r| r.exists()) {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        Ok(Detector::Events {
            rx,
            roots: roots
                .iter()
                .map(|r| std::fs::canonicalize(r).unwrap_or_else(|_| r.clone()))
                .collect(),
            _watcher: watcher,
        })
    }

    /// Rebuild through `listener` if anything changed or nothing has built yet.
    ///
    /// After a failure, unchanged sources keep returning the same error
    /// without another rebuild.
    pub fn notify(&mut self, listener: &mut impl Listener) -> Result<(), CompileError> {
        let changed = self.detect_changes();

        if !changed {
            if let Some(err) = &self.last_error {
                return Err(err.clone());
            }
            if !self.force_refresh {
                return Ok(());
            }
        }

        match listener.refresh() {
            Ok(()) => {
                self.force_refresh = false;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn detect_changes(&mut self) -> bool {
        if !self.events_pending() {
            return false;
        }
        let next = Snapshot::scan(&self.roots, &self.filter, &self.snapshot);
        let changes = self.snapshot.changes(&next);
        self.snapshot = next;
        for path in &changes {
            debug!("watch"; "changed: {}", path.display());
        }
        !changes.is_empty()
    }

    /// Poll mode always rescans. Events mode drains the queue and rescans
    /// only when a relevant path was touched.
    fn events_pending(&self) -> bool {
        let Detector::Events { rx, roots, .. } = &self.detector else {
            return true;
        };
        let mut relevant = false;
        for res in rx.try_iter() {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    relevant |= event
                        .paths
                        .iter()
                        .any(|p| self.filter.matches_under(roots, p));
                }
                Err(e) => log!("watch"; "notify error: {e}"),
            }
        }
        relevant
    }
}
