//! Requests to a long-lived engine server over TCP.
//!
//! The wire protocol has no framing: the client streams the payload, shuts
//! down its write half to mark the end of the request, and reads until the
//! server closes the connection.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{ENGINE_HOST, Transport};
use crate::error::{ExtractError, Result};
use crate::kind::ExtractionKind;
use crate::server::{self, ServerHandle};

/// Payload write size; bounds the size of individual socket writes.
pub const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Transport bound to one engine server.
///
/// The server answers only the kind it was started for, so the kind is not
/// sent on the wire. Requests for a kind with different engine flags are
/// rejected with [`ExtractError::KindMismatch`] before connecting.
#[derive(Debug, Clone)]
pub struct PersistentTransport {
    port: u16,
    kind: ExtractionKind,
    timeout: Duration,
}

impl PersistentTransport {
    pub fn new(port: u16, kind: ExtractionKind, timeout: Duration) -> Self {
        Self {
            port,
            kind,
            timeout,
        }
    }

    /// Transport for a server started by this process.
    pub fn for_server(handle: &ServerHandle, timeout: Duration) -> Self {
        Self::new(handle.port(), handle.kind(), timeout)
    }

    /// Transport for whichever server is currently registered.
    pub fn attach(timeout: Duration) -> Result<Self> {
        let info = server::running().ok_or(ExtractError::NoServerRunning)?;
        Ok(Self::new(info.port, info.kind, timeout))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn kind(&self) -> ExtractionKind {
        self.kind
    }

    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect((ENGINE_HOST, self.port))
            .await
            .map_err(|e| {
                ExtractError::Transport(format!(
                    "connecting to engine server on port {}: {e}",
                    self.port
                ))
            })?;

        for chunk in payload.chunks(WRITE_CHUNK_SIZE) {
            stream
                .write_all(chunk)
                .await
                .map_err(|e| ExtractError::Transport(format!("writing request: {e}")))?;
        }
        stream
            .shutdown()
            .await
            .map_err(|e| ExtractError::Transport(format!("closing request: {e}")))?;
        debug!(
            name: "transport.persistent.sent",
            port = self.port,
            bytes = payload.len(),
            "Request sent to engine server"
        );

        let mut response = Vec::new();
        let mut buf = vec![0u8; WRITE_CHUNK_SIZE];
        loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| ExtractError::Transport(format!("reading response: {e}")))?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
        }

        debug!(
            name: "transport.persistent.received",
            port = self.port,
            bytes = response.len(),
            "Response received from engine server"
        );
        Ok(response)
    }
}

#[async_trait]
impl Transport for PersistentTransport {
    async fn send(&self, kind: ExtractionKind, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.kind.same_wire_request(kind) {
            return Err(ExtractError::KindMismatch {
                server: self.kind,
                requested: kind,
            });
        }

        tokio::time::timeout(self.timeout, self.exchange(payload))
            .await
            .map_err(|_| ExtractError::Timeout(self.timeout))?
    }

    fn name(&self) -> &'static str {
        "persistent"
    }
}
