// SPDX-License-Identifier: MIT
//! Engine process handles.
//!
//! The supervisor needs exactly three capabilities from a live process — pid,
//! liveness, graceful terminate — so they sit behind a trait and tests swap
//! in a fake instead of spawning real binaries.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

/// Everything needed to launch one engine process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub binary: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(String, String)>,
    /// Log sinks; created (truncating any previous run) before the child
    /// starts.
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

/// Capabilities the supervisor needs from a running engine process.
#[async_trait]
pub trait EngineProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// OS-level liveness: the process exists and has not been reaped.
    fn is_alive(&mut self) -> bool;

    /// Graceful terminate (SIGTERM on Unix), then block until exit.
    async fn terminate(&mut self) -> io::Result<()>;
}

/// Spawns engine processes. The production impl shells out; tests substitute
/// an in-process fake.
pub trait Spawn: Send + Sync {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<Box<dyn EngineProcess>>;
}

// ─── Real child process ───────────────────────────────────────────────────────

pub struct ChildProcess {
    child: tokio::process::Child,
}

#[async_trait]
impl EngineProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SIGTERM first so the engine can clean up. ESRCH means it already
            // exited; wait() below still reaps it.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    return Err(err);
                }
            }
        }

        #[cfg(not(unix))]
        if let Err(e) = self.child.start_kill() {
            // InvalidInput: the child has already exited.
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(e);
            }
        }

        let status = self.child.wait().await?;
        debug!(code = ?status.code(), "engine process exited");
        Ok(())
    }
}

/// Default spawner: open the log sinks and exec the binary with stdio
/// redirected into them.
pub struct OsSpawner;

impl Spawn for OsSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<Box<dyn EngineProcess>> {
        let stdout = std::fs::File::create(&spec.stdout_log)?;
        let stderr = std::fs::File::create(&spec.stderr_log)?;

        let mut cmd = tokio::process::Command::new(&spec.binary);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn()?;
        debug!(pid = ?child.id(), binary = %spec.binary.display(), "engine spawned");
        Ok(Box::new(ChildProcess { child }))
    }
}
