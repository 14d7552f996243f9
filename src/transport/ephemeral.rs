//! One engine process per request.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::{Transport, engine_command};
use crate::config::EngineConfig;
use crate::error::{ExtractError, Result};
use crate::kind::ExtractionKind;

/// Spawns the engine with the kind's flags, writes the payload to its
/// stdin, closes stdin, and collects stdout until the process exits.
#[derive(Debug, Clone)]
pub struct EphemeralTransport {
    config: EngineConfig,
}

impl EphemeralTransport {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn exchange(&self, kind: ExtractionKind, payload: &[u8]) -> Result<Vec<u8>> {
        let mut cmd = engine_command(&self.config);
        cmd.args(kind.flags(self.config.dialect))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ExtractError::Transport(format!(
                "failed to spawn engine {}: {e}",
                self.config.java_executable().display()
            ))
        })?;
        debug!(
            name: "engine.spawn",
            pid = child.id(),
            kind = %kind,
            bytes = payload.len(),
            "Spawned extraction engine"
        );

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractError::Transport("missing engine stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::Transport("missing engine stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractError::Transport("missing engine stderr".to_string()))?;

        // Output is drained while input is written; the engine may start
        // answering before it has read everything.
        let write = async move {
            let written = stdin.write_all(payload).await;
            drop(stdin);
            written
        };
        let (written, output, errors) = tokio::join!(write, read_all(stdout), read_all(stderr));

        let status = child.wait().await?;
        let output = output?;
        let errors = String::from_utf8_lossy(&errors?).trim().to_string();

        if !status.success() {
            warn!(
                name: "engine.failed",
                status = %status,
                stderr = %errors,
                "Extraction engine exited unsuccessfully"
            );
            return Err(ExtractError::Engine {
                status: status.code().unwrap_or(-1),
                stderr: errors,
            });
        }

        match written {
            Ok(()) => {}
            // The engine may stop reading once it has what it needs.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(name: "engine.stdin.closed", "Engine closed stdin early");
            }
            Err(e) => return Err(ExtractError::Transport(format!("writing to engine: {e}"))),
        }

        if !errors.is_empty() {
            debug!(name: "engine.stderr", stderr = %errors, "Engine wrote to stderr");
        }
        Ok(output)
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[async_trait]
impl Transport for EphemeralTransport {
    async fn send(&self, kind: ExtractionKind, payload: &[u8]) -> Result<Vec<u8>> {
        let timeout = self.config.timeout();
        tokio::time::timeout(timeout, self.exchange(kind, payload))
            .await
            .map_err(|_| ExtractError::Timeout(timeout))?
    }

    fn name(&self) -> &'static str {
        "ephemeral"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Install `body` as `<home>/bin/java` and return the Java home.
    fn fake_java(body: &str) -> TempDir {
        let home = tempfile::tempdir().unwrap();
        let bin = home.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let java = bin.join("java");
        std::fs::write(&java, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
        home
    }

    fn transport(home: &Path, timeout_secs: u64) -> EphemeralTransport {
        EphemeralTransport::new(EngineConfig {
            java_home: Some(home.to_str().unwrap().to_string()),
            jar_path: "tika-app.jar".to_string(),
            timeout_secs,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_payload_round_trips_through_stdin() {
        let home = fake_java("cat");
        let out = transport(home.path(), 10)
            .send(ExtractionKind::Text, b"payload bytes")
            .await
            .unwrap();
        assert_eq!(out, b"payload bytes");
    }

    #[tokio::test]
    async fn test_flags_reach_the_engine() {
        let home = fake_java(r#"cat > /dev/null; echo "$@""#);
        let out = transport(home.path(), 10)
            .send(ExtractionKind::Metadata, b"x")
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            "-Djava.awt.headless=true -jar tika-app.jar -m -j"
        );
    }

    #[tokio::test]
    async fn test_large_payload_does_not_deadlock() {
        let home = fake_java("cat");
        let payload = vec![b'a'; 4 * 1024 * 1024];
        let out = transport(home.path(), 30)
            .send(ExtractionKind::Text, &payload)
            .await
            .unwrap();
        assert_eq!(out.len(), payload.len());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_engine_error() {
        let home = fake_java("cat > /dev/null; echo 'parse failure' >&2; exit 3");
        let err = transport(home.path(), 10)
            .send(ExtractionKind::Text, b"x")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ExtractError::Engine { status: 3, ref stderr } if stderr == "parse failure")
        );
    }

    #[tokio::test]
    async fn test_hung_engine_times_out() {
        let home = fake_java("sleep 30");
        let err = transport(home.path(), 1)
            .send(ExtractionKind::Text, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let home = tempfile::tempdir().unwrap();
        let err = transport(home.path(), 10)
            .send(ExtractionKind::Text, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Transport(_)));
    }
}
