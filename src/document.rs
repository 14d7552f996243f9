//! A single document with lazily extracted, cached results.

use chrono::{DateTime, FixedOffset};
use tokio::sync::OnceCell;

use crate::decode::{Metadata, MimeType, creation_date_of, decode_metadata, decode_text, mimetype_of};
use crate::error::{ExtractError, Result};
use crate::extractor::Extractor;
use crate::kind::ExtractionKind;
use crate::source::ContentSource;

/// A document bound to an [`Extractor`].
///
/// Each accessor runs its engine request on first use and caches the
/// result; `mimetype` and `creation_date` are read from the cached metadata.
/// Concurrent callers of one accessor share a single request.
///
/// ```rust,ignore
/// let doc = extractor.document("sample.docx")?;
/// let text = doc.text().await?;
/// let content_type = doc.metadata().await?.content_type();
/// ```
#[derive(Debug)]
pub struct Document {
    extractor: Extractor,
    source: ContentSource,
    text: OnceCell<String>,
    html: OnceCell<String>,
    metadata: OnceCell<Metadata>,
    mimetype: OnceCell<Option<MimeType>>,
    creation_date: OnceCell<Option<DateTime<FixedOffset>>>,
}

impl Document {
    pub fn new(extractor: Extractor, source: ContentSource) -> Self {
        Self {
            extractor,
            source,
            text: OnceCell::new(),
            html: OnceCell::new(),
            metadata: OnceCell::new(),
            mimetype: OnceCell::new(),
            creation_date: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    pub fn is_path(&self) -> bool {
        self.source.is_path()
    }

    pub fn is_uri(&self) -> bool {
        self.source.is_uri()
    }

    pub fn is_stream(&self) -> bool {
        self.source.is_stream()
    }

    /// Raw document bytes.
    pub async fn data(&self) -> Result<&[u8]> {
        self.source
            .bytes(self.extractor.http(), self.extractor.config().fetch.timeout())
            .await
    }

    async fn request(&self, kind: ExtractionKind) -> Result<Vec<u8>> {
        let data = self.data().await?;
        self.extractor.request(kind, data).await
    }

    pub async fn text(&self) -> Result<&str> {
        self.text
            .get_or_try_init(|| async { decode_text(self.request(ExtractionKind::Text).await?) })
            .await
            .map(String::as_str)
    }

    pub async fn html(&self) -> Result<&str> {
        self.html
            .get_or_try_init(|| async { decode_text(self.request(ExtractionKind::Html).await?) })
            .await
            .map(String::as_str)
    }

    pub async fn metadata(&self) -> Result<&Metadata> {
        self.metadata
            .get_or_try_init(|| async {
                let raw = self.request(ExtractionKind::Metadata).await?;
                decode_metadata(self.extractor.config().engine.dialect, &raw)
            })
            .await
    }

    /// Registry entry for the document's content type, if known.
    pub async fn mimetype(&self) -> Result<Option<&MimeType>> {
        self.mimetype
            .get_or_try_init(|| async { Ok::<_, ExtractError>(mimetype_of(self.metadata().await?)) })
            .await
            .map(Option::as_ref)
    }

    /// `Creation-Date` from the metadata, if reported.
    pub async fn creation_date(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.creation_date
            .get_or_try_init(|| async { creation_date_of(self.metadata().await?) })
            .await
            .copied()
    }
}
