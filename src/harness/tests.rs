use super::*;
use crate::build::BuildArgs;
use crate::config::WatchMode;
use crate::utils::exec::CmdOutput;
use axum::body::{self, Body};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use tempfile::TempDir;

const VALID: &str = r#"package controllers

import "github.com/hubply/gospf"

type App struct {
	*gospf.Controller
}

func (c App) Index() gospf.Result {
	return c.Render()
}
"#;

const BROKEN: &str = r#"package controllers

import "github.com/hubply/gospf"

type App struct {
	*gospf.Controller
}

func (c App) Index( gospf.Result {
	return c.Render()
}
"#;

/// "Compiles" by writing a script that idles, counting builds.
#[derive(Default)]
struct ScriptToolchain {
    builds: AtomicUsize,
}

impl Toolchain for ScriptToolchain {
    fn build(&self, _root: &Path, args: &BuildArgs) -> anyhow::Result<CmdOutput> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        #[cfg(unix)]
        crate::app::test_support::write_script(&args.output, "exec sleep 30");
        Ok(CmdOutput {
            success: true,
            text: String::new(),
        })
    }

    fn fetch(&self, _root: &Path, _package: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Stand-in for the running app: answers every request with `ok`.
fn spawn_backend() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }
            if received.is_empty() {
                continue;
            }
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
            );
        }
    });
    port
}

fn harness(dir: &TempDir, toolchain: Arc<ScriptToolchain>) -> (Arc<Harness>, PathBuf) {
    let root = dir.path().join("chat");
    let source = root.join("app/controllers/app.go");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(&source, VALID).unwrap();

    let mut config = HarnessConfig {
        root,
        import_path: "example.com/chat".to_string(),
        ..Default::default()
    };
    config.http.addr = "127.0.0.1".to_string();
    config.harness.port = spawn_backend();
    config.harness.startup_timeout = 5;
    config.watch.mode = WatchMode::Poll;
    config.build.bin_dir = Some(dir.path().join("bin"));

    let harness = Harness::with_toolchain(Arc::new(config), toolchain).unwrap();
    (Arc::new(harness), source)
}

fn get(path: &str) -> Request {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_error_page_then_recovery() {
    let dir = TempDir::new().unwrap();
    let toolchain = Arc::new(ScriptToolchain::default());
    let (harness, source) = harness(&dir, Arc::clone(&toolchain));

    let response = Arc::clone(&harness).handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
    assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);

    let response = Arc::clone(&harness).handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);

    std::fs::write(&source, BROKEN).unwrap();
    let response = Arc::clone(&harness).handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let page = body_text(response).await;
    assert!(page.contains("Go Compilation Error"));
    assert!(page.contains("app/controllers/app.go:9 (Go code)"));
    assert!(page.contains("func (c App) Index( gospf.Result {"));

    let response = Arc::clone(&harness).handle(get("/favicon.ico")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    std::fs::write(&source, VALID.replace("Index", "Dashboard")).unwrap();
    let response = Arc::clone(&harness).handle(get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
    assert_eq!(toolchain.builds.load(Ordering::SeqCst), 2);

    harness.shutdown();
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_share_one_rebuild() {
    let dir = TempDir::new().unwrap();
    let toolchain = Arc::new(ScriptToolchain::default());
    let (harness, _source) = harness(&dir, Arc::clone(&toolchain));

    let requests: Vec<_> = (0..4)
        .map(|_| tokio::spawn(Arc::clone(&harness).handle(get("/"))))
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);
}

