//! Long-running poller.
//!
//! Runs the [`Scheduler`] in the foreground and maps process signals onto it:
//! SIGTERM/SIGINT shut down, SIGHUP reloads the poll interval, SIGUSR1 runs a
//! check. A PID file lets other `herald` invocations find the process.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, HeraldError, Result};
use crate::scheduler::{format_interval, Scheduler, SchedulerHandle};

/// Requests another `herald` process can send to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    Stop,
    /// Re-read the persisted poll interval.
    Reload,
    /// Run a poll cycle now.
    Check,
}

impl DaemonSignal {
    #[cfg(unix)]
    fn kill_arg(self) -> &'static str {
        match self {
            DaemonSignal::Stop => "-TERM",
            DaemonSignal::Reload => "-HUP",
            DaemonSignal::Check => "-USR1",
        }
    }
}

pub struct Daemon {
    ctx: Arc<AppContext>,
    run_on_start: bool,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, run_on_start: bool) -> Self {
        Self { ctx, run_on_start }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("herald").join("daemon.pid"))
    }

    fn write_pid_file(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "{}", std::process::id())
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(&self) -> Result<()> {
        if let Some(pid) = running_pid() {
            return Err(HeraldError::Other(format!(
                "Another daemon instance is already running (PID {})",
                pid
            )));
        }

        let pipeline = Arc::new(self.ctx.pipeline()?);
        let interval = self.ctx.poll_interval()?;
        let cancel = CancellationToken::new();

        let (scheduler, handle) =
            Scheduler::new(pipeline, self.ctx.store.clone(), interval, cancel.clone());

        // Install handlers before announcing the PID, so a signal sent right
        // after startup is never lost.
        let signals = signals::Signals::install()?;

        let pid_path = Self::pid_file_path();
        if let Some(path) = &pid_path {
            Self::write_pid_file(path).map_err(|e| {
                HeraldError::Other(format!("Failed to write PID file {}: {}", path.display(), e))
            })?;
        }

        tracing::info!(
            "Herald daemon started (interval: {}, PID: {})",
            format_interval(interval),
            std::process::id()
        );

        let scheduler_task = scheduler.run_on_start(self.run_on_start).spawn();
        let signal_task = tokio::spawn(signals.listen(handle, cancel.clone()));

        let result = scheduler_task.await;
        signal_task.abort();

        if let Some(path) = &pid_path {
            let _ = fs::remove_file(path);
        }

        result.map_err(|e| HeraldError::Other(format!("Scheduler task failed: {}", e)))?;
        tracing::info!("Daemon shut down");
        Ok(())
    }
}

#[cfg(unix)]
mod signals {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    use super::*;

    pub(super) struct Signals {
        terminate: Signal,
        interrupt: Signal,
        hangup: Signal,
        user1: Signal,
    }

    impl Signals {
        pub(super) fn install() -> Result<Self> {
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
                hangup: signal(SignalKind::hangup())?,
                user1: signal(SignalKind::user_defined1())?,
            })
        }

        pub(super) async fn listen(mut self, handle: SchedulerHandle, cancel: CancellationToken) {
            loop {
                tokio::select! {
                    _ = self.terminate.recv() => break,
                    _ = self.interrupt.recv() => break,
                    _ = self.hangup.recv() => match handle.reload_interval().await {
                        Ok(interval) => {
                            tracing::info!("Reloaded poll interval: {}", format_interval(interval))
                        }
                        Err(e) => tracing::warn!("Failed to reload poll interval: {}", e),
                    },
                    _ = self.user1.recv() => {
                        // The cycle runs on the scheduler task; don't block
                        // shutdown signals while it does.
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle.trigger().await {
                                tracing::warn!("Requested check failed: {}", e);
                            }
                        });
                    }
                }
            }

            tracing::info!("Shutdown signal received");
            cancel.cancel();
        }
    }
}

#[cfg(not(unix))]
mod signals {
    use super::*;

    pub(super) struct Signals;

    impl Signals {
        pub(super) fn install() -> Result<Self> {
            Ok(Self)
        }

        pub(super) async fn listen(self, _handle: SchedulerHandle, cancel: CancellationToken) {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// PID of a live daemon, if there is one.
pub fn running_pid() -> Option<u32> {
    let pid = read_pid(&Daemon::pid_file_path()?)?;
    process_exists(pid).then_some(pid)
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Send `request` to the running daemon. Returns its PID.
pub fn signal_daemon(request: DaemonSignal) -> Result<u32> {
    let pid = running_pid().ok_or_else(|| HeraldError::Other("No daemon is running".into()))?;
    send_signal(pid, request)?;
    Ok(pid)
}

#[cfg(unix)]
fn send_signal(pid: u32, request: DaemonSignal) -> Result<()> {
    use std::process::Command;
    let status = Command::new("kill")
        .args([request.kill_arg(), &pid.to_string()])
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(HeraldError::Other(format!(
            "Failed to signal daemon (PID {})",
            pid
        )))
    }
}

#[cfg(windows)]
fn send_signal(pid: u32, request: DaemonSignal) -> Result<()> {
    use std::process::Command;
    if request != DaemonSignal::Stop {
        return Err(HeraldError::Other(
            "Only `daemon stop` is supported on this platform".into(),
        ));
    }

    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(HeraldError::Other(format!("Failed to stop daemon (PID {})", pid)))
    }
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<u32> {
    let pid = signal_daemon(DaemonSignal::Stop)?;
    if let Some(path) = Daemon::pid_file_path() {
        let _ = fs::remove_file(path);
    }
    Ok(pid)
}

/// Check daemon status
pub fn daemon_status() -> String {
    let Some(path) = Daemon::pid_file_path() else {
        return "Daemon is not running".to_string();
    };

    match read_pid(&path) {
        Some(pid) if process_exists(pid) => format!("Daemon is running (PID: {})", pid),
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
