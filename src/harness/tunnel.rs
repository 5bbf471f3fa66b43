//! WebSocket pass-through.
//!
//! The upgrade request is replayed to the backend over a fresh HTTP/1.1
//! connection. When the backend answers 101 both sides are upgraded and
//! bytes are copied in each direction until either side stops.

use crate::debug;
use crate::harness::proxy::Backend;
use crate::harness::response::plain;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

/// Which side of a tunnel finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelEnd {
    Client,
    Backend,
}

/// Copy bytes both ways until one direction ends, then drop both streams.
///
/// There is no half-close: the first direction to hit EOF or an error
/// tears the whole tunnel down.
pub async fn tunnel<C, B>(client: C, backend: B) -> TunnelEnd
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut backend_rd, mut backend_wr) = tokio::io::split(backend);

    tokio::select! {
        res = tokio::io::copy(&mut client_rd, &mut backend_wr) => {
            if let Err(e) = res {
                debug!("proxy"; "websocket client side: {e}");
            }
            TunnelEnd::Client
        }
        res = tokio::io::copy(&mut backend_rd, &mut client_wr) => {
            if let Err(e) = res {
                debug!("proxy"; "websocket backend side: {e}");
            }
            TunnelEnd::Backend
        }
    }
}

/// Relay a WebSocket upgrade to the backend.
pub async fn upgrade(backend: &Backend, mut request: Request) -> Response {
    if backend.tls {
        return plain(
            StatusCode::BAD_GATEWAY,
            "WebSocket proxying to a TLS backend is not supported.",
        );
    }

    let client_upgrade = hyper::upgrade::on(&mut request);

    let io = match backend.connect().await {
        Ok(io) => io,
        Err(e) => {
            debug!("proxy"; "websocket dial {}:{}: {e}", backend.host, backend.port);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Error contacting backend server.");
        }
    };

    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => return plain(StatusCode::BAD_GATEWAY, format!("backend handshake failed: {e}")),
    };
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            debug!("proxy"; "websocket backend connection: {e}");
        }
    });

    let (parts, _) = request.into_parts();
    let backend_request = Request::from_parts(parts, Body::empty());
    let mut backend_response = match sender.send_request(backend_request).await {
        Ok(response) => response,
        Err(e) => return plain(StatusCode::BAD_GATEWAY, format!("backend request failed: {e}")),
    };

    if backend_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        return backend_response.map(Body::new);
    }

    let backend_upgrade = hyper::upgrade::on(&mut backend_response);
    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok((client, backend)) => {
                let end = tunnel(TokioIo::new(client), TokioIo::new(backend)).await;
                debug!("proxy"; "websocket closed by {end:?}");
            }
            Err(e) => debug!("proxy"; "websocket upgrade failed: {e}"),
        }
    });

    let (parts, _) = backend_response.into_parts();
    Response::from_parts(parts, Body::empty())
}
