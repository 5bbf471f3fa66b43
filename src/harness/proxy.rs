//! HTTP forwarding to the supervised app.
//!
//! A plain backend gets a fresh HTTP/1.1 connection per request and both
//! bodies are streamed, so event streams and long polls flow through as
//! they are produced. A TLS backend is replayed through a blocking `ureq`
//! agent with buffered bodies. Redirects are passed through, not followed.

use crate::debug;
use crate::error::HarnessError;
use crate::harness::response::plain;
use axum::body::{self, Body};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, Version, header};
use axum::response::Response;
use hyper_util::rt::TokioIo;
use rustc_hash::FxHashSet;
use std::io::{self, Read};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Request body limit on the buffered (TLS) path.
const BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Where the supervised app listens and how to talk to it.
#[derive(Clone)]
pub struct Backend {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    agent: ureq::Agent,
}

impl Backend {
    pub fn new(host: &str, port: u16, tls: bool) -> Result<Self, HarnessError> {
        let mut builder = ureq::AgentBuilder::new()
            .redirects(0)
            .timeout_connect(Duration::from_secs(5));
        if tls {
            // The app serves the same self-signed certificate the harness does.
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(HarnessError::BackendTls)?;
            builder = builder.tls_connector(Arc::new(connector));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            tls,
            agent: builder.build(),
        })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Open a plain TCP connection to the app.
    pub async fn connect(&self) -> io::Result<TokioIo<TcpStream>> {
        TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map(TokioIo::new)
    }
}

/// Forward `request` to the backend and relay its answer.
///
/// An unreachable backend is a 502.
pub async fn forward(backend: &Backend, request: Request) -> Response {
    if backend.tls {
        return forward_buffered(backend, request).await;
    }
    match forward_streaming(backend, request).await {
        Ok(response) => response,
        Err(message) => {
            debug!("proxy"; "{message}");
            plain(StatusCode::BAD_GATEWAY, message)
        }
    }
}

async fn forward_streaming(backend: &Backend, request: Request) -> Result<Response, String> {
    let io = backend
        .connect()
        .await
        .map_err(|e| format!("backend unreachable at {}: {e}", backend.base_url()))?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("backend handshake failed: {e}"))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("proxy"; "backend connection: {e}");
        }
    });

    let response = sender
        .send_request(backend_request(backend, request))
        .await
        .map_err(|e| format!("backend request failed: {e}"))?;
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Rewrite a client request for the backend connection.
fn backend_request(backend: &Backend, request: Request) -> Request {
    let (mut parts, body) = request.into_parts();
    parts.uri = parts
        .uri
        .path_and_query()
        .cloned()
        .map(Uri::from)
        .unwrap_or_else(|| Uri::from_static("/"));
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    if !parts.headers.contains_key(header::HOST)
        && let Ok(host) = HeaderValue::from_str(&format!("{}:{}", backend.host, backend.port))
    {
        parts.headers.insert(header::HOST, host);
    }
    Request::from_parts(parts, body)
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    for name in HOP_BY_HOP.iter().copied().chain(listed.iter().map(String::as_str)) {
        headers.remove(name);
    }
}

struct Proxied {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

async fn forward_buffered(backend: &Backend, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{path_and_query}", backend.base_url());
    let headers = request_headers(&parts.headers);
    let body = match body::to_bytes(body, BODY_LIMIT_BYTES).await {
        Ok(body) => body.to_vec(),
        Err(e) => return plain(StatusCode::BAD_REQUEST, format!("failed to read request body: {e}")),
    };

    let agent = backend.agent.clone();
    let proxied =
        tokio::task::spawn_blocking(move || forward_blocking(&agent, &method, &url, headers, body))
            .await;
    match proxied {
        Ok(Ok(proxied)) => into_response(proxied),
        Ok(Err(message)) => {
            debug!("proxy"; "{message}");
            plain(StatusCode::BAD_GATEWAY, message)
        }
        Err(e) => plain(StatusCode::BAD_GATEWAY, format!("proxy worker failed: {e}")),
    }
}

fn forward_blocking(
    agent: &ureq::Agent,
    method: &str,
    url: &str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
) -> Result<Proxied, String> {
    let mut req = agent.request(method, url);
    for (name, value) in &headers {
        req = req.set(name, value);
    }

    let result = if body.is_empty() {
        req.call()
    } else {
        req.send_bytes(&body)
    };
    let resp = match result {
        Ok(resp) | Err(ureq::Error::Status(_, resp)) => resp,
        Err(ureq::Error::Transport(e)) => {
            return Err(format!("backend unreachable at {url}: {e}"));
        }
    };

    let status = resp.status();
    let mut seen = FxHashSet::default();
    let mut headers = Vec::new();
    // `headers_names` repeats a name once per occurrence; `all` already
    // returns every value.
    for name in resp.headers_names() {
        if !seen.insert(name.to_ascii_lowercase()) {
            continue;
        }
        for value in resp.all(&name) {
            headers.push((name.clone(), value.to_string()));
        }
    }
    let mut body = Vec::new();
    resp.into_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("failed reading backend response: {e}"))?;

    Ok(Proxied {
        status,
        headers,
        body,
    })
}

fn into_response(proxied: Proxied) -> Response {
    let mut response = Response::new(Body::from(proxied.body));
    *response.status_mut() = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);

    for (name, value) in proxied.headers {
        let (Ok(name), Ok(value)) = (
            header::HeaderName::from_str(&name),
            HeaderValue::from_str(&value),
        ) else {
            continue;
        };
        response.headers_mut().append(name, value);
    }
    let headers = response.headers_mut();
    strip_hop_by_hop(headers);
    headers.remove(header::CONTENT_LENGTH);
    response
}

/// One `(name, value)` per header name, repeated values joined.
///
/// `ureq` keeps a single value per name, so repeats are folded the way
/// HTTP allows: `; ` for cookies, `, ` for everything else.
fn request_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut headers = headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    headers
        .keys()
        .filter_map(|name| {
            let values: Vec<&str> = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            if values.is_empty() {
                return None;
            }
            let separator = if *name == header::COOKIE { "; " } else { ", " };
            Some((name.as_str().to_string(), values.join(separator)))
        })
        .collect()
}

/// Whether the client asked to switch to WebSocket.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.eq_ignore_ascii_case("websocket"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    /// Answer one HTTP/1.1 request with `reply`, returning what was received.
    fn one_shot_backend(reply: &'static str) -> (u16, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            stream.write_all(reply.as_bytes()).unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_forward_relays_request_and_response() {
        let (port, backend_thread) = one_shot_backend(
            "HTTP/1.1 201 Created\r\nX-App: chat\r\nConnection: close\r\nContent-Length: 5\r\n\r\nhello",
        );
        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let request = Request::builder()
            .method("GET")
            .uri("/notes/7?draft=1")
            .header("X-Trace", "abc")
            .header("Connection", "keep-alive")
            .body(Body::empty())
            .unwrap();

        let response = forward(&backend, request).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-app").unwrap(), "chat");
        assert!(response.headers().get("connection").is_none());
        let body = body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let received = backend_thread.join().unwrap().to_ascii_lowercase();
        assert!(received.starts_with("get /notes/7?draft=1 http/1.1"));
        assert!(received.contains("x-trace: abc"));
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let (port, _backend_thread) = one_shot_backend(
            "HTTP/1.1 302 Found\r\nLocation: /login\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = forward(&backend, request).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/login");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let port = crate::app::free_port().unwrap();
        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = forward(&backend, request).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_repeated_response_headers_are_relayed_once() {
        let (port, _backend_thread) = one_shot_backend(
            "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = forward(&backend, request).await;

        let cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }

    #[test]
    fn test_buffered_path_relays_repeated_headers_once() {
        let (port, _backend_thread) = one_shot_backend(
            "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        );
        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let url = format!("{}/", backend.base_url());

        let proxied = forward_blocking(&backend.agent, "GET", &url, Vec::new(), Vec::new()).unwrap();
        assert_eq!(proxied.body, b"ok");
        let response = into_response(proxied);

        let cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
    }

    #[test]
    fn test_repeated_request_headers_are_folded() {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        headers.append(header::CONNECTION, HeaderValue::from_static("x-private"));
        headers.append("x-private", HeaderValue::from_static("secret"));
        headers.append(header::CONTENT_LENGTH, HeaderValue::from_static("0"));

        let mut folded = request_headers(&headers);
        folded.sort();
        assert_eq!(
            folded,
            vec![
                ("accept".to_string(), "text/html, */*".to_string()),
                ("cookie".to_string(), "a=1; b=2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_stream_is_relayed_while_backend_holds_open() {
        use hyper::body::Body as _;
        use std::pin::Pin;
        use std::sync::mpsc;
        use tokio::time::timeout;

        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let (release, held) = mpsc::channel::<()>();
        let backend_thread = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n",
                )
                .unwrap();
            stream.flush().unwrap();
            let _ = held.recv_timeout(Duration::from_secs(10));
            let _ = stream.write_all(b"0\r\n\r\n");
        });

        let backend = Backend::new("127.0.0.1", port, false).unwrap();
        let request = Request::builder().uri("/events").body(Body::empty()).unwrap();

        let response = timeout(Duration::from_secs(2), forward(&backend, request))
            .await
            .expect("headers arrive before the stream ends");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        assert!(response.headers().get("transfer-encoding").is_none());

        let mut body = response.into_body();
        let frame = timeout(
            Duration::from_secs(2),
            std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)),
        )
        .await
        .expect("first chunk arrives before the stream ends")
        .unwrap()
        .unwrap();
        assert_eq!(&frame.into_data().unwrap()[..], b"hello");

        release.send(()).unwrap();
        backend_thread.join().unwrap();
    }

    #[test]
    fn test_websocket_detection_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_upgrade(&headers));
        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_upgrade(&headers));
        headers.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_upgrade(&headers));
    }
}
