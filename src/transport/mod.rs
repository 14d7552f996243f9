//! Transports carrying a document payload to the extraction engine.
//!
//! # Strategies
//!
//! - [`EphemeralTransport`] - spawns the engine once per request (stdin/stdout)
//! - [`PersistentTransport`] - talks to a long-lived engine server over TCP
//!
//! An [`Extractor`](crate::Extractor) is built with exactly one transport;
//! nothing routes requests implicitly.

mod ephemeral;
mod persistent;

pub use ephemeral::EphemeralTransport;
pub use persistent::{PersistentTransport, WRITE_CHUNK_SIZE};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::kind::ExtractionKind;

/// JVM flag keeping the engine off any display.
pub const HEADLESS_FLAG: &str = "-Djava.awt.headless=true";

/// Host the persistent engine server listens on.
pub const ENGINE_HOST: &str = "localhost";

/// Trait for engine transports.
///
/// A transport sends the complete payload, signals end of input, and
/// returns the complete raw response. It never returns partial output.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send `payload` as a `kind` request and return the raw response bytes.
    async fn send(&self, kind: ExtractionKind, payload: &[u8]) -> Result<Vec<u8>>;

    /// Get the transport name for logging and debugging.
    fn name(&self) -> &'static str;
}

/// `<java> -Djava.awt.headless=true -jar <jar>`, ready for mode flags.
pub(crate) fn engine_command(config: &EngineConfig) -> Command {
    let mut cmd = Command::new(config.java_executable());
    cmd.arg(HEADLESS_FLAG).arg("-jar").arg(&config.jar_path);
    cmd
}
