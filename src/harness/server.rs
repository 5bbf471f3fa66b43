//! The public listener.

use super::{Harness, dispatch};
use crate::error::HarnessError;
use crate::log;
use anyhow::{Context, Result};
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

/// Serve until SIGINT/SIGTERM, then kill the app.
///
/// The first request triggers the first build.
pub fn serve(harness: Arc<Harness>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    ctrlc::set_handler(move || {
        log!("harness"; "shutting down...");
        shutdown.shutdown();
    })
    .context("failed to set Ctrl+C handler")?;

    let result = runtime.block_on(listen(Arc::clone(&harness), handle));
    harness.shutdown();
    result
}

async fn listen(harness: Arc<Harness>, handle: Handle) -> Result<()> {
    let config = &harness.config;
    let addr = resolve(&config.listen_addr())?;
    let ssl = config.http.ssl;
    let tls = if ssl {
        let (cert, key) = (config.http.ssl_cert.clone(), config.http.ssl_key.clone());
        let tls = RustlsConfig::from_pem_file(&cert, &key)
            .await
            .map_err(|source| HarnessError::Tls { cert, key, source })?;
        Some(tls)
    } else {
        None
    };

    let router = Router::new()
        .fallback(dispatch)
        .with_state(Arc::clone(&harness));

    let listening = handle.clone();
    tokio::spawn(async move {
        if let Some(addr) = listening.listening().await {
            let scheme = if ssl { "https" } else { "http" };
            log!("harness"; "listening on {scheme}://{addr}");
        }
    });

    let served = match tls {
        Some(tls) => {
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
        None => {
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
    };
    served.map_err(|source| HarnessError::Bind { addr, source })?;
    Ok(())
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .with_context(|| format!("invalid listen address `{addr}`"))?
        .next()
        .with_context(|| format!("`{addr}` resolved to no address"))
}
