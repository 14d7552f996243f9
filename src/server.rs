//! Lifecycle of the persistent engine server.
//!
//! At most one server is registered per process. A server is started for a
//! single extraction kind and answers only that kind until it is stopped.

use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::TikaConfig;
use crate::error::{ExtractError, Result};
use crate::kind::ExtractionKind;
use crate::transport::{ENGINE_HOST, engine_command};

const FIRST_PROBE_DELAY: Duration = Duration::from_millis(50);
const MAX_PROBE_DELAY: Duration = Duration::from_secs(1);

/// Identity of a registered server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    pub pid: u32,
    pub port: u16,
    pub kind: ExtractionKind,
}

struct RunningServer {
    info: ServerInfo,
    child: Child,
}

enum Slot {
    /// Reserved while the process boots, so a concurrent start fails.
    Starting { port: u16 },
    Running(RunningServer),
}

static REGISTRY: Mutex<Option<Slot>> = Mutex::new(None);

fn registry() -> MutexGuard<'static, Option<Slot>> {
    // A panic while holding the lock leaves the slot in a consistent state.
    REGISTRY
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// The currently registered server, if one has finished starting.
pub fn running() -> Option<ServerInfo> {
    match registry().as_ref() {
        Some(Slot::Running(server)) => Some(server.info),
        _ => None,
    }
}

/// Owner of a started server.
///
/// Dropping the handle without calling [`ServerHandle::stop`] still kills
/// the process, but does not wait for it to exit.
#[derive(Debug)]
pub struct ServerHandle {
    info: ServerInfo,
    stopped: bool,
}

impl ServerHandle {
    pub fn info(&self) -> ServerInfo {
        self.info
    }

    pub fn pid(&self) -> u32 {
        self.info.pid
    }

    pub fn port(&self) -> u16 {
        self.info.port
    }

    pub fn kind(&self) -> ExtractionKind {
        self.info.kind
    }

    /// Kill the server and wait for it to exit.
    ///
    /// Once this returns the port no longer accepts connections.
    pub async fn stop(mut self) -> Result<()> {
        self.stopped = true;
        stop_registered(Some(self.info.pid)).await
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if let Some(mut server) = take_running(Some(self.info.pid)) {
            if let Err(e) = server.child.start_kill() {
                warn!(name: "server.kill.failed", pid = self.info.pid, error = %e, "Failed to kill engine server");
            }
        }
    }
}

/// Clears a `Starting` reservation unless the start completed.
struct Reservation {
    committed: bool,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            let mut slot = registry();
            if matches!(*slot, Some(Slot::Starting { .. })) {
                *slot = None;
            }
        }
    }
}

fn reserve(port: u16) -> Result<Reservation> {
    let mut slot = registry();
    if let Some(existing) = slot.as_ref() {
        let port = match existing {
            Slot::Starting { port } => *port,
            Slot::Running(server) => server.info.port,
        };
        return Err(ExtractError::ServerAlreadyRunning { port });
    }
    *slot = Some(Slot::Starting { port });
    Ok(Reservation { committed: false })
}

/// Spawn the engine in server mode and wait until it accepts connections.
///
/// `port` defaults to `config.server.port`. Fails with
/// [`ExtractError::ServerAlreadyRunning`] when a server is registered.
pub async fn start(
    config: &TikaConfig,
    kind: ExtractionKind,
    port: Option<u16>,
) -> Result<ServerHandle> {
    let port = port.unwrap_or(config.server.port);
    let mut reservation = reserve(port)?;

    let mut cmd = engine_command(&config.engine);
    cmd.arg("--server")
        .arg("--port")
        .arg(port.to_string())
        .args(kind.flags(config.engine.dialect))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        ExtractError::Transport(format!(
            "failed to spawn engine server {}: {e}",
            config.engine.java_executable().display()
        ))
    })?;
    let pid = child
        .id()
        .ok_or_else(|| ExtractError::Transport("engine server exited immediately".to_string()))?;
    info!(name: "server.spawn", pid, port, kind = %kind, "Spawned engine server");

    wait_until_ready(&mut child, port, config.server.ready_timeout()).await?;

    let info = ServerInfo { pid, port, kind };
    *registry() = Some(Slot::Running(RunningServer { info, child }));
    reservation.committed = true;

    info!(name: "server.ready", pid, port, kind = %kind, "Engine server accepting connections");
    Ok(ServerHandle {
        info,
        stopped: false,
    })
}

/// Stop the registered server, if any.
pub async fn kill_server() -> Result<()> {
    stop_registered(None).await
}

fn take_running(pid: Option<u32>) -> Option<RunningServer> {
    let mut slot = registry();
    let owned = matches!(
        slot.as_ref(),
        Some(Slot::Running(server)) if pid.is_none_or(|p| p == server.info.pid)
    );
    if !owned {
        return None;
    }
    match slot.take() {
        Some(Slot::Running(server)) => Some(server),
        _ => None,
    }
}

async fn stop_registered(pid: Option<u32>) -> Result<()> {
    let Some(mut server) = take_running(pid) else {
        debug!(name: "server.stop.noop", "No engine server registered");
        return Ok(());
    };

    if server.child.try_wait()?.is_none() {
        server
            .child
            .kill()
            .await
            .map_err(|e| ExtractError::Transport(format!("killing engine server: {e}")))?;
    }

    info!(
        name: "server.stopped",
        pid = server.info.pid,
        port = server.info.port,
        "Engine server stopped"
    );
    Ok(())
}

/// Probe the port with exponential backoff until it accepts a connection.
///
/// The engine gives no ready signal; a successful connect is taken as one.
/// The engine reads that probe connection as an empty request and may log a
/// parse failure for it on the inherited stderr.
async fn wait_until_ready(child: &mut Child, port: u16, budget: Duration) -> Result<()> {
    let deadline = Instant::now() + budget;
    let mut delay = FIRST_PROBE_DELAY;

    loop {
        if let Some(status) = child.try_wait()? {
            return Err(ExtractError::Transport(format!(
                "engine server exited during startup with {status}"
            )));
        }

        match TcpStream::connect((ENGINE_HOST, port)).await {
            Ok(_) => return Ok(()),
            Err(e) if Instant::now() + delay >= deadline => {
                debug!(name: "server.probe.gave_up", port, error = %e, "Engine server never became ready");
                return Err(ExtractError::Timeout(budget));
            }
            Err(_) => {
                sleep(delay).await;
                delay = (delay * 2).min(MAX_PROBE_DELAY);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ServerConfig};
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    fn fake_java(body: &str) -> TempDir {
        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let java = bin.join("java");
        std::fs::write(&java, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
        home
    }

    fn config(home: &TempDir, ready_timeout_secs: u64) -> TikaConfig {
        TikaConfig {
            engine: EngineConfig {
                java_home: Some(home.path().to_str().unwrap().to_string()),
                ..Default::default()
            },
            server: ServerConfig {
                ready_timeout_secs,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_start_registers_and_stop_clears() {
        // The listener stands in for the engine's socket; the script just lives.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let home = fake_java("exec sleep 30");

        let handle = start(&config(&home, 5), ExtractionKind::Text, Some(port))
            .await
            .unwrap();
        assert_eq!(handle.port(), port);
        assert_eq!(handle.kind(), ExtractionKind::Text);
        assert_eq!(running(), Some(handle.info()));

        handle.stop().await.unwrap();
        assert_eq!(running(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_second_start_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let home = fake_java("exec sleep 30");
        let config = config(&home, 5);

        let first = start(&config, ExtractionKind::Text, Some(port)).await.unwrap();
        let err = start(&config, ExtractionKind::Html, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ServerAlreadyRunning { port: p } if p == port));
        assert_eq!(running().map(|i| i.pid), Some(first.pid()));

        first.stop().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_engine_exiting_during_startup_releases_slot() {
        let home = fake_java("exit 1");
        let err = start(&config(&home, 5), ExtractionKind::Text, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Transport(_)));
        assert_eq!(running(), None);
        // The slot is free again.
        assert!(reserve(1).is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_never_ready_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let home = fake_java("exec sleep 30");

        let err = start(&config(&home, 1), ExtractionKind::Text, Some(port))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout(_)));
        assert_eq!(running(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_kill_server_without_server_is_noop() {
        assert!(kill_server().await.is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_dropping_handle_unregisters() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let home = fake_java("exec sleep 30");

        let handle = start(&config(&home, 5), ExtractionKind::Html, Some(port))
            .await
            .unwrap();
        drop(handle);
        assert_eq!(running(), None);
    }
}
