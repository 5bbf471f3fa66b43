//! Supervision of the compiled application process.
//!
//! An [`App`] owns at most one child process. It is started once, probed
//! until it accepts TCP connections, and killed (SIGINT, grace period,
//! then SIGKILL) when replaced, when the harness shuts down, or on drop.

use crate::config::HarnessConfig;
use crate::error::CompileError;
use crate::{debug, log};
use std::{
    io,
    net::{TcpListener, TcpStream, ToSocketAddrs},
    path::PathBuf,
    process::{Child, Command, ExitStatus},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// How long a SIGINT'd app may take to exit before it is force-killed.
const KILL_GRACE: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Flags the bootstrap understands, captured at build time.
#[derive(Debug, Clone)]
struct LaunchArgs {
    import_path: String,
    src_path: PathBuf,
    run_mode: String,
    host: String,
    cwd: PathBuf,
}

#[derive(Debug)]
pub struct App {
    pub bin_path: PathBuf,
    pub port: u16,
    launch: LaunchArgs,
    child: Option<Child>,
}

impl App {
    pub fn new(bin_path: PathBuf, config: &HarnessConfig) -> Self {
        Self {
            bin_path,
            port: 0,
            launch: LaunchArgs {
                import_path: config.import_path.clone(),
                src_path: config.src_path(),
                run_mode: config.run_mode.clone(),
                host: config.backend_host().to_string(),
                cwd: config.root.clone(),
            },
            child: None,
        }
    }

    /// Launch the binary on `port` and wait until it accepts connections.
    ///
    /// If the process exits first, or `timeout` elapses, it is killed and a
    /// `ProcessStart` error is returned.
    pub fn start(&mut self, port: u16, timeout: Duration) -> Result<(), CompileError> {
        self.kill();
        self.port = port;

        let port_arg = port.to_string();
        debug!("app"; "starting {} on port {port}", self.bin_path.display());
        let child = Command::new(&self.bin_path)
            .arg("-importPath")
            .arg(&self.launch.import_path)
            .arg("-srcPath")
            .arg(&self.launch.src_path)
            .arg("-runMode")
            .arg(&self.launch.run_mode)
            .arg("-port")
            .arg(&port_arg)
            .env("PORT", &port_arg)
            .current_dir(&self.launch.cwd)
            .spawn()
            .map_err(|e| {
                CompileError::process_start(format!(
                    "failed to launch {}: {e}",
                    self.bin_path.display()
                ))
            })?;
        self.child = Some(child);

        match self.wait_until_listening(timeout) {
            Ok(()) => {
                log!("app"; "listening on {}:{port}", self.launch.host);
                Ok(())
            }
            Err(err) => {
                self.kill();
                Err(err)
            }
        }
    }

    fn wait_until_listening(&mut self, timeout: Duration) -> Result<(), CompileError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.try_wait() {
                return Err(CompileError::process_start(format!(
                    "app exited with {status} before listening on port {}",
                    self.port
                )));
            }
            if self.accepts_connections() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CompileError::process_start(format!(
                    "app did not listen on port {} within {}s",
                    self.port,
                    timeout.as_secs()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn accepts_connections(&self) -> bool {
        let Ok(addrs) = (self.launch.host.as_str(), self.port).to_socket_addrs() else {
            return false;
        };
        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok())
    }

    /// Exit status, if the child has exited.
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        self.child.as_mut()?.try_wait().ok().flatten()
    }

    pub fn is_running(&mut self) -> bool {
        self.child.is_some() && self.try_wait().is_none()
    }

    /// Block until the app exits or `stop` is raised.
    pub fn wait(&mut self, stop: &AtomicBool) -> Option<ExitStatus> {
        while !stop.load(Ordering::SeqCst) {
            if let Some(status) = self.try_wait() {
                return Some(status);
            }
            thread::sleep(POLL_INTERVAL);
        }
        None
    }

    /// Stop the child: SIGINT, up to [`KILL_GRACE`], then a hard kill.
    ///
    /// Safe to call any number of times.
    pub fn kill(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        debug!("app"; "killing pid {}", child.id());

        #[cfg(unix)]
        {
            let pid = child.id() as libc::pid_t;
            // SAFETY: pid belongs to a child we have not reaped yet.
            unsafe {
                libc::kill(pid, libc::SIGINT);
            }
            let deadline = Instant::now() + KILL_GRACE;
            while Instant::now() < deadline {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }

        if let Err(e) = child.kill() {
            log!("app"; "failed to kill pid {}: {e}", child.id());
        }
        let _ = child.wait();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.kill();
    }
}

/// A TCP port nothing is listening on right now.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Shell scripts standing in for compiled apps.
#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `#!/bin/sh` script to `path`.
    pub fn write_script(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn fake_binary(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("app-bin");
        write_script(&path, body);
        path
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::fake_binary;
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> HarnessConfig {
        HarnessConfig {
            root: dir.path().to_path_buf(),
            import_path: "example.com/chat".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_waits_for_listener() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let bin = fake_binary(dir.path(), "exec sleep 30");
        let mut config = config_for(&dir);
        config.http.addr = "127.0.0.1".to_string();
        let mut app = App::new(bin, &config);

        app.start(port, Duration::from_secs(5)).unwrap();
        assert!(app.is_running());

        app.kill();
        assert!(!app.is_running());
        app.kill();
    }

    #[test]
    fn test_app_exiting_early_is_a_start_error() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(dir.path(), "exit 3");
        let mut app = App::new(bin, &config_for(&dir));

        let err = app.start(free_port().unwrap(), Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind, crate::error::CompileErrorKind::ProcessStart);
        assert!(err.description.contains("exited"));
    }

    #[test]
    fn test_startup_timeout() {
        let dir = TempDir::new().unwrap();
        let bin = fake_binary(dir.path(), "exec sleep 30");
        let mut config = config_for(&dir);
        config.http.addr = "127.0.0.1".to_string();
        let mut app = App::new(bin, &config);

        let started = Instant::now();
        let err = app.start(free_port().unwrap(), Duration::from_millis(300)).unwrap_err();
        assert!(err.description.contains("did not listen"));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!app.is_running());
    }

    #[test]
    fn test_flags_and_env_are_passed() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("args.txt");
        let bin = fake_binary(
            dir.path(),
            &format!("echo \"$@ PORT=$PORT\" > {}\nexit 0", out.display()),
        );
        let mut config = config_for(&dir);
        config.run_mode = "prod".to_string();
        let mut app = App::new(bin, &config);

        let _ = app.start(4321, Duration::from_secs(5));
        let args = std::fs::read_to_string(out).unwrap();
        assert!(args.contains("-importPath example.com/chat"));
        assert!(args.contains("-runMode prod"));
        assert!(args.contains("-port 4321 PORT=4321"));
    }

    #[test]
    fn test_sigint_stops_app() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let bin = fake_binary(dir.path(), "trap 'exit 0' INT\nwhile true; do sleep 0.05; done");
        let mut config = config_for(&dir);
        config.http.addr = "127.0.0.1".to_string();
        let mut app = App::new(bin, &config);
        app.start(port, Duration::from_secs(5)).unwrap();

        let started = Instant::now();
        drop(app);
        assert!(started.elapsed() < KILL_GRACE + Duration::from_secs(1));
    }
}
