//! Extraction context: configuration, transport and HTTP client.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::debug;

use crate::config::TikaConfig;
use crate::decode::{Extracted, decode};
use crate::document::Document;
use crate::error::Result;
use crate::kind::ExtractionKind;
use crate::server::{self, ServerHandle};
use crate::source::ContentSource;
use crate::transport::{EphemeralTransport, PersistentTransport, Transport};

/// Everything needed to run extraction requests.
///
/// Cloning is cheap; clones share the transport and HTTP client.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: Arc<TikaConfig>,
    transport: Arc<dyn Transport>,
    http: reqwest::Client,
}

impl Extractor {
    /// Extractor spawning one engine process per request.
    pub fn new(config: TikaConfig) -> Self {
        let transport = Arc::new(EphemeralTransport::new(config.engine.clone()));
        Self::with_transport(config, transport)
    }

    /// Extractor using the given transport.
    pub fn with_transport(config: TikaConfig, transport: Arc<dyn Transport>) -> Self {
        debug!(name: "extractor.created", transport = transport.name(), "Extractor created");
        Self {
            config: Arc::new(config),
            transport,
            http: reqwest::Client::new(),
        }
    }

    /// Extractor sending every request to a started server.
    pub fn persistent(config: TikaConfig, handle: &ServerHandle) -> Self {
        let transport = PersistentTransport::for_server(handle, config.engine.timeout());
        Self::with_transport(config, Arc::new(transport))
    }

    /// Extractor sending every request to the registered server.
    pub fn attach(config: TikaConfig) -> Result<Self> {
        let transport = PersistentTransport::attach(config.engine.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Replace the HTTP client used to fetch remote documents.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &TikaConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Raw engine response for a `kind` request.
    pub async fn request(&self, kind: ExtractionKind, data: &[u8]) -> Result<Vec<u8>> {
        self.transport.send(kind, data).await
    }

    /// Extract `kind` from an in-memory document.
    ///
    /// ```rust,ignore
    /// let data = std::fs::read("sample.pages")?;
    /// let text = extractor.read(ExtractionKind::Text, &data).await?;
    /// let metadata = extractor.read(ExtractionKind::Metadata, &data).await?;
    /// ```
    pub async fn read(&self, kind: ExtractionKind, data: &[u8]) -> Result<Extracted> {
        let raw = self.request(kind, data).await?;
        decode(kind, self.config.engine.dialect, raw)
    }

    /// Start the persistent engine server for `kind`.
    ///
    /// Pass the returned handle to [`Extractor::persistent`] to use it.
    pub async fn server(&self, kind: ExtractionKind, port: Option<u16>) -> Result<ServerHandle> {
        server::start(&self.config, kind, port).await
    }

    /// Stop the registered server, if any.
    pub async fn kill_server() -> Result<()> {
        server::kill_server().await
    }

    /// Document from a path or `http(s)` URI.
    pub fn document(&self, input: &str) -> Result<Document> {
        Ok(Document::new(self.clone(), ContentSource::resolve(input)?))
    }

    /// Document read from a stream on first use.
    pub fn document_from_reader<R>(&self, reader: R) -> Document
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Document::new(self.clone(), ContentSource::from_reader(reader))
    }

    /// Document over bytes already in memory.
    pub fn document_from_bytes(&self, data: Vec<u8>) -> Document {
        Document::new(self.clone(), ContentSource::from_bytes(data))
    }
}
