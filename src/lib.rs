//! Tika Extract
//!
//! Plain text, HTML and metadata extraction from office documents, PDFs,
//! images and other formats, delegated to an external Apache Tika engine.
//!
//! # Architecture
//!
//! - **Sources**: a path, an `http(s)` URI or a stream, buffered once
//! - **Transports**: one engine process per request, or a persistent engine server over TCP
//! - **Server lifecycle**: at most one persistent server per process
//! - **Decoding**: text and HTML verbatim, metadata from JSON or legacy `key: value` lines
//! - **Documents**: cached accessors over a single source
//!
//! # Modules
//!
//! - [`config`]: layered configuration and CLI arguments
//! - [`decode`]: response decoding, metadata mapping and MIME lookup
//! - [`document`]: the cached per-document facade
//! - [`extractor`]: the extraction context
//! - [`server`]: persistent server lifecycle
//! - [`source`]: document byte sources
//! - [`transport`]: engine transports
//!
//! # Usage
//!
//! ```rust,ignore
//! use tika_extract::{Extractor, ExtractionKind, TikaConfig};
//!
//! let extractor = Extractor::new(TikaConfig::default());
//! let doc = extractor.document("sample.docx")?;
//! println!("{}", doc.text().await?);
//!
//! // Reuse one engine process for many text requests.
//! let server = extractor.server(ExtractionKind::Text, None).await?;
//! let fast = Extractor::persistent(TikaConfig::default(), &server);
//! println!("{}", fast.document("sample.pages")?.text().await?);
//! server.stop().await?;
//! ```

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod decode;
pub mod document;
pub mod error;
pub mod extractor;
pub mod kind;
pub mod server;
pub mod source;
pub mod transport;

pub use config::TikaConfig;
pub use decode::{Extracted, Metadata, MetadataValue, MimeType};
pub use document::Document;
pub use error::{ExtractError, Result};
pub use extractor::Extractor;
pub use kind::{ExtractionKind, MetadataDialect};
pub use server::{ServerHandle, ServerInfo};
pub use source::ContentSource;
