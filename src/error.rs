//! Error types for extraction requests.

use std::time::Duration;

use thiserror::Error;

use crate::kind::ExtractionKind;

/// Errors surfaced by document sourcing, engine transport and decoding.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The input string is neither an absolute URI nor an existing path.
    #[error("missing file or invalid URI: {0}")]
    NotFound(String),

    /// The input cannot be turned into a byte source.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Fetching a remote document failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The engine response is not well-formed for the requested kind.
    #[error("decode error: {0}")]
    Decode(String),

    /// The engine process or socket could not be used.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine process exited unsuccessfully.
    #[error("engine exited with status {status}: {stderr}")]
    Engine {
        /// Exit code, or -1 when the process was terminated by a signal.
        status: i32,
        /// Captured standard error of the engine.
        stderr: String,
    },

    /// An engine exchange did not complete in time.
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),

    /// A persistent server is already registered for this process.
    #[error("an extraction server is already running on port {port}")]
    ServerAlreadyRunning {
        /// Port of the registered server.
        port: u16,
    },

    /// No persistent server is registered for this process.
    #[error("no extraction server is running")]
    NoServerRunning,

    /// A persistent server was asked for a kind it was not started for.
    #[error("server answers {server} requests, cannot serve {requested}")]
    KindMismatch {
        /// Kind the server was started with.
        server: ExtractionKind,
        /// Kind the caller asked for.
        requested: ExtractionKind,
    },

    /// Local I/O error while reading a document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
