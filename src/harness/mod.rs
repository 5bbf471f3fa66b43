//! The reverse proxy that rebuilds the app on demand.
//!
//! ```text
//! request ──▶ favicon while broken? ──▶ 204
//!    │
//!    ▼ (rebuild lock, blocking worker)
//! Watcher::notify ──Err──▶ error page (500)
//!    │ Ok
//!    ▼
//! Upgrade: websocket? ──▶ tunnel::upgrade
//!    │ no
//!    ▼
//! proxy::forward
//! ```
//!
//! All mutable harness state lives here: the rebuild lock guards the
//! watcher and the running app, and an atomic flag remembers whether the
//! previous request saw a build error.

mod proxy;
mod response;
mod server;
mod tunnel;

pub use server::serve;

use crate::app::{self, App};
use crate::build::{Builder, GoToolchain, Toolchain};
use crate::config::HarnessConfig;
use crate::error::{CompileError, HarnessError};
use crate::logger::{status_error, status_success};
use crate::watch::{Listener, WatchFilter, Watcher};
use crate::{debug, log};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use parking_lot::Mutex;
use proxy::Backend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const FAVICON: &str = "/favicon.ico";

/// Builds and restarts the app; the watcher's [`Listener`].
struct Supervisor {
    builder: Builder,
    app: Option<App>,
    port: u16,
    startup_timeout: Duration,
}

impl Supervisor {
    fn stop(&mut self) {
        if let Some(mut app) = self.app.take() {
            app.kill();
        }
    }
}

impl Listener for Supervisor {
    fn refresh(&mut self) -> Result<(), CompileError> {
        let started = Instant::now();
        self.stop();

        let result = self.builder.build().and_then(|mut app| {
            app.start(self.port, self.startup_timeout)?;
            Ok(app)
        });
        match result {
            Ok(app) => {
                self.app = Some(app);
                status_success(&format!("rebuilt in {:.1}s", started.elapsed().as_secs_f32()));
                Ok(())
            }
            Err(err) => {
                status_error("build failed", &err.to_string());
                Err(err)
            }
        }
    }
}

struct Rebuild {
    watcher: Watcher,
    supervisor: Supervisor,
}

pub struct Harness {
    config: Arc<HarnessConfig>,
    backend: Backend,
    rebuild: Mutex<Rebuild>,
    last_request_had_error: AtomicBool,
}

impl Harness {
    /// Set up a harness using the `go` found on `PATH`.
    pub fn new(config: Arc<HarnessConfig>) -> Result<Self, HarnessError> {
        let toolchain = GoToolchain::locate()?;
        Self::with_toolchain(config, Arc::new(toolchain))
    }

    pub fn with_toolchain(
        config: Arc<HarnessConfig>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Result<Self, HarnessError> {
        let port = match config.harness.port {
            0 => app::free_port().map_err(HarnessError::NoFreePort)?,
            port => port,
        };
        let backend = Backend::new(config.backend_host(), port, config.http.ssl)?;
        let watcher = Watcher::new(config.watch_paths(), WatchFilter::go(), config.watch.mode);
        let supervisor = Supervisor {
            builder: Builder::new(Arc::clone(&config), toolchain),
            app: None,
            port,
            startup_timeout: Duration::from_secs(config.harness.startup_timeout),
        };
        debug!("harness"; "app will listen on {}", backend.base_url());

        Ok(Self {
            config,
            backend,
            rebuild: Mutex::new(Rebuild {
                watcher,
                supervisor,
            }),
            last_request_had_error: AtomicBool::new(false),
        })
    }

    /// Rebuild if needed. Concurrent callers wait for the rebuild in flight.
    pub fn refresh(&self) -> Result<(), CompileError> {
        let mut rebuild = self.rebuild.lock();
        let Rebuild {
            watcher,
            supervisor,
        } = &mut *rebuild;
        watcher.notify(supervisor)
    }

    /// Kill the app. Called once the listener has stopped.
    pub fn shutdown(&self) {
        log!("harness"; "stopping app");
        self.rebuild.lock().supervisor.stop();
    }

    pub async fn handle(self: Arc<Self>, request: Request) -> Response {
        if request.uri().path() == FAVICON && self.last_request_had_error.load(Ordering::SeqCst) {
            return response::no_content();
        }

        let harness = Arc::clone(&self);
        let refreshed = tokio::task::spawn_blocking(move || harness.refresh()).await;
        match refreshed {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.last_request_had_error.store(true, Ordering::SeqCst);
                return response::error_page(&err);
            }
            Err(e) => {
                return response::plain(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("rebuild worker failed: {e}"),
                );
            }
        }
        self.last_request_had_error.store(false, Ordering::SeqCst);

        if proxy::is_websocket_upgrade(request.headers()) {
            tunnel::upgrade(&self.backend, request).await
        } else {
            proxy::forward(&self.backend, request).await
        }
    }
}

/// Axum fallback handler.
async fn dispatch(State(harness): State<Arc<Harness>>, request: Request) -> Response {
    harness.handle(request).await
}

#[cfg(test)]
mod tests;
