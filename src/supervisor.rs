// SPDX-License-Identifier: MIT
//! Engine process lifecycle.
//!
//! One `EngineSupervisor` owns at most one live engine session: the spawned
//! process, its loopback address, the per-session MAC secret, and the two log
//! files. Every state transition and every consistent read goes through one
//! async mutex, so callers never observe a half-built session. HTTP traffic
//! is deliberately NOT under that lock — requests snapshot the endpoint
//! first, and a request racing a restart surfaces as a connection error
//! instead of stalling the restart.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth;
use crate::client;
use crate::error::{is_connection_error, HostError, Result};
use crate::process::{EngineProcess, LaunchSpec, OsSpawner, Spawn};

/// Address + secret snapshot a request needs; copied out under the lock so
/// the HTTP round trip itself runs lock-free.
#[derive(Debug, Clone)]
pub struct EngineEndpoint {
    pub base_url: String,
    pub secret: Vec<u8>,
}

struct Session {
    base_url: String,
    secret: Vec<u8>,
    process: Box<dyn EngineProcess>,
}

#[derive(Default)]
struct SupervisorState {
    session: Option<Session>,
    // Log paths outlive the session when log retention is on, so debug_info
    // can still point at them after a stop.
    stdout_log: Option<PathBuf>,
    stderr_log: Option<PathBuf>,
}

pub struct EngineSupervisor {
    binary: PathBuf,
    source_path: Option<PathBuf>,
    keep_logfiles: bool,
    spawner: Box<dyn Spawn>,
    http: reqwest::Client,
    state: Mutex<SupervisorState>,
}

impl EngineSupervisor {
    pub fn new(binary: PathBuf, source_path: Option<PathBuf>, keep_logfiles: bool) -> Self {
        Self::with_spawner(binary, source_path, keep_logfiles, Box::new(OsSpawner))
    }

    /// Build a supervisor with a custom process spawner (tests substitute a
    /// fake engine).
    pub fn with_spawner(
        binary: PathBuf,
        source_path: Option<PathBuf>,
        keep_logfiles: bool,
        spawner: Box<dyn Spawn>,
    ) -> Self {
        Self {
            binary,
            source_path,
            keep_logfiles,
            spawner,
            http: reqwest::Client::new(),
            state: Mutex::new(SupervisorState::default()),
        }
    }

    /// Spawn a fresh engine session: unused loopback port, new secret,
    /// secret-transfer file, log sinks, process. Runs start-to-finish under
    /// the state lock so a concurrent stop/restart cannot interleave.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await
    }

    /// Terminate the engine if it is running. Idempotent: a second stop is a
    /// no-op. With log retention off, both log files are removed best-effort
    /// (a file that is already gone counts as removed).
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state).await
    }

    /// Stop (if running) then start, in one lock acquisition. Concurrent
    /// callers block for the duration and never observe the intermediate
    /// stopped state.
    pub async fn restart(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if running_locked(&mut state) {
            self.stop_locked(&mut state).await?;
        }
        self.start_locked(&mut state).await
    }

    /// True when a session exists and the OS still reports the process alive.
    /// Says nothing about whether the engine has finished initializing; see
    /// [`is_ready`](Self::is_ready).
    pub async fn is_running(&self) -> bool {
        let mut state = self.state.lock().await;
        running_locked(&mut state)
    }

    /// Running AND answering the health probe. A connection-refused/reset
    /// from a freshly spawned engine means "still initializing" and maps to
    /// `Ok(false)`; every other failure class propagates untouched.
    pub async fn is_ready(&self) -> Result<bool> {
        if !self.is_running().await {
            debug!("engine not running");
            return Ok(false);
        }
        let Some(endpoint) = self.endpoint().await else {
            return Ok(false);
        };
        match client::send_signed(&self.http, &endpoint, reqwest::Method::GET, "/ping", None).await
        {
            Ok(_) => Ok(true),
            Err(HostError::Transport { ref source, .. }) if is_connection_error(source) => {
                debug!("engine not ready yet: {source}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of the live session's address and secret, if any.
    pub async fn endpoint(&self) -> Option<EngineEndpoint> {
        let state = self.state.lock().await;
        state.session.as_ref().map(|session| EngineEndpoint {
            base_url: session.base_url.clone(),
            secret: session.secret.clone(),
        })
    }

    /// Human-readable status snapshot, taken under the lock.
    pub async fn debug_info(&self) -> String {
        let mut state = self.state.lock().await;
        let stdout_log = fmt_log(&state.stdout_log);
        let stderr_log = fmt_log(&state.stderr_log);

        let live_url = match state.session.as_mut() {
            Some(session) => {
                if session.process.is_alive() {
                    Some(session.base_url.clone())
                } else {
                    None
                }
            }
            None => None,
        };

        if let Some(url) = live_url {
            format!(
                "engine\n  listening at: {url}\n  binary: {}\n  stdout log: {stdout_log}\n  stderr log: {stderr_log}",
                self.binary.display()
            )
        } else if state.stdout_log.is_some() || state.stderr_log.is_some() {
            format!(
                "engine is no longer running\n  binary: {}\n  stdout log: {stdout_log}\n  stderr log: {stderr_log}",
                self.binary.display()
            )
        } else {
            "engine is not running".to_string()
        }
    }

    async fn start_locked(&self, state: &mut SupervisorState) -> Result<()> {
        let port = pick_unused_port()
            .map_err(|e| HostError::Startup(format!("could not pick a local port: {e}")))?;
        let secret = auth::generate_secret(auth::SECRET_LENGTH);

        // The engine reads this file once at startup and deletes it; the file
        // is not ours to clean up.
        let secret_path = write_secret_file(&secret)
            .map_err(|e| HostError::Startup(format!("could not write secret file: {e}")))?;

        let mut args: Vec<OsString> = vec![
            "serve".into(),
            "--port".into(),
            port.to_string().into(),
            "-l".into(),
            "--secret-file".into(),
            secret_path.into_os_string(),
        ];
        if let Some(ref source_path) = self.source_path {
            args.push("--extra-source-path".into());
            args.push(source_path.clone().into_os_string());
        }

        let log_dir = run_log_dir()
            .map_err(|e| HostError::Startup(format!("could not create log directory: {e}")))?;
        let stdout_log = log_dir.join(format!("engine_{port}_stdout.log"));
        let stderr_log = log_dir.join(format!("engine_{port}_stderr.log"));

        let spec = LaunchSpec {
            binary: self.binary.clone(),
            args,
            // Backtraces from a crashing engine land in the stderr log.
            env: vec![("RUST_BACKTRACE".to_string(), "1".to_string())],
            stdout_log: stdout_log.clone(),
            stderr_log: stderr_log.clone(),
        };

        let mut process = self.spawner.spawn(&spec).map_err(|e| {
            HostError::Startup(format!("could not spawn {}: {e}", self.binary.display()))
        })?;

        if !process.is_alive() {
            return Err(HostError::Startup(format!(
                "engine exited immediately after launch; see {}",
                stderr_log.display()
            )));
        }

        let base_url = format!("http://127.0.0.1:{port}");
        info!(%base_url, pid = ?process.pid(), "engine started");

        state.session = Some(Session {
            base_url,
            secret,
            process,
        });
        state.stdout_log = Some(stdout_log);
        state.stderr_log = Some(stderr_log);
        Ok(())
    }

    async fn stop_locked(&self, state: &mut SupervisorState) -> Result<()> {
        if let Some(mut session) = state.session.take() {
            info!(base_url = %session.base_url, "stopping engine");
            session
                .process
                .terminate()
                .await
                .map_err(HostError::Shutdown)?;
        }

        if !self.keep_logfiles {
            for path in [state.stdout_log.take(), state.stderr_log.take()]
                .into_iter()
                .flatten()
            {
                if let Err(e) = remove_if_exists(&path) {
                    warn!(path = %path.display(), "could not remove engine log: {e}");
                }
            }
        }
        Ok(())
    }
}

fn running_locked(state: &mut SupervisorState) -> bool {
    match state.session.as_mut() {
        Some(session) => session.process.is_alive(),
        None => false,
    }
}

fn fmt_log(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Bind to port 0 and let the OS hand out a free port, then release it for
/// the engine to re-bind. The window between the two is a real but accepted
/// race.
fn pick_unused_port() -> io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Write the secret to a private (0600) temp file and persist it. The engine
/// deletes the file once it has read it.
fn write_secret_file(secret: &[u8]) -> io::Result<PathBuf> {
    use std::io::Write as _;
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(secret)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Per-run directory for engine logs: `$TMPDIR/enginehost_<pid>`.
fn run_log_dir() -> io::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("enginehost_{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Delete a file, treating "already gone" as success.
fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
