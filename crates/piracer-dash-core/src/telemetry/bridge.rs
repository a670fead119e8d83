//! Telemetry bridge subprocess lifecycle

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time;
use tracing::{debug, info, warn};

use super::{TelemetryError, TelemetryEvent, TelemetryReader, TelemetrySource};
use crate::config::{first_existing, SearchPaths, TelemetryConfig};

/// Runs the bridge script and decodes its stdout
pub struct TelemetryBridge {
    script: PathBuf,
    child: Option<Child>,
    reader: TelemetryReader<ChildStdout>,
    /// First event, read while waiting for startup
    pending: Option<TelemetryEvent>,
    ended: bool,
}

impl TelemetryBridge {
    /// Locate the script and launch it
    ///
    /// Waits up to the startup timeout for the first line. A bridge that is
    /// merely slow is kept; one that exits immediately is an error.
    pub async fn start(
        config: &TelemetryConfig,
        search: &SearchPaths,
    ) -> Result<Self, TelemetryError> {
        let candidates = search.bridge_script_candidates(&config.script_name);
        let script =
            first_existing(&candidates).ok_or(TelemetryError::ScriptNotFound(candidates))?;

        let mut bridge = Self::spawn(&config.interpreter, &script, &config.extra_args)?;
        bridge.await_startup(config.startup_timeout()).await?;
        info!(script = %bridge.script.display(), pid = ?bridge.id(), "Telemetry bridge started");
        Ok(bridge)
    }

    /// Launch `interpreter script args…` with stdout captured
    pub fn spawn(
        interpreter: &str,
        script: &Path,
        args: &[String],
    ) -> Result<Self, TelemetryError> {
        let mut child = Command::new(interpreter)
            .arg(script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TelemetryError::Spawn {
                interpreter: interpreter.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(TelemetryError::NoStdout)?;

        Ok(Self {
            script: script.to_path_buf(),
            child: Some(child),
            reader: TelemetryReader::new(stdout),
            pending: None,
            ended: false,
        })
    }

    async fn await_startup(&mut self, timeout: Duration) -> Result<(), TelemetryError> {
        match time::timeout(timeout, self.reader.next_event()).await {
            Ok(Some(event)) => {
                self.pending = Some(event);
                Ok(())
            }
            Ok(None) => {
                self.ended = true;
                self.shutdown(Duration::ZERO).await;
                Err(TelemetryError::ExitedEarly)
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Telemetry bridge has not produced data yet"
                );
                Ok(())
            }
        }
    }

    /// Resolved script path
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// OS process id while running
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// True until shutdown or end of output
    pub fn is_running(&self) -> bool {
        self.child.is_some() && !self.ended
    }

    /// Ask the bridge to exit, wait up to `grace`, then kill it
    ///
    /// Idempotent; returns once the process is gone or abandoned.
    pub async fn shutdown(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            request_terminate(pid);
        }

        match time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Telemetry bridge exited"),
            Ok(Err(e)) => warn!("Failed to wait for telemetry bridge: {e}"),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Telemetry bridge did not exit in time; killing it"
                );
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill telemetry bridge: {e}");
                }
            }
        }
    }
}

#[cfg(unix)]
fn request_terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        debug!(pid, "Child pid out of range; skipping SIGTERM");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(pid, "SIGTERM failed: {e}");
    }
}

#[cfg(not(unix))]
fn request_terminate(_pid: u32) {}

impl TelemetrySource for TelemetryBridge {
    async fn next_event(&mut self) -> Option<TelemetryEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        if self.ended {
            return None;
        }
        let event = self.reader.next_event().await;
        if event.is_none() {
            self.ended = true;
            warn!(script = %self.script.display(), "Telemetry bridge output ended");
        }
        event
    }
}
