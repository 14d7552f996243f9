//! Interpretation of raw engine responses by extraction kind.
//!
//! Text and HTML responses pass through verbatim. Metadata responses are
//! parsed in the configured [`MetadataDialect`]; mimetype responses are the
//! metadata response projected onto its `Content-Type` field.

mod metadata;
mod mime;

pub use metadata::{CONTENT_TYPE, CREATION_DATE, Metadata, MetadataValue, parse_json, parse_legacy};
pub use mime::MimeType;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{ExtractError, Result};
use crate::kind::{ExtractionKind, MetadataDialect};

/// A fully decoded engine response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Extracted {
    Text(String),
    Html(String),
    Metadata(Metadata),
    Mimetype(Option<MimeType>),
}

impl Extracted {
    pub fn kind(&self) -> ExtractionKind {
        match self {
            Self::Text(_) => ExtractionKind::Text,
            Self::Html(_) => ExtractionKind::Html,
            Self::Metadata(_) => ExtractionKind::Metadata,
            Self::Mimetype(_) => ExtractionKind::Mimetype,
        }
    }

    /// Text or HTML content.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) | Self::Html(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_metadata(self) -> Option<Metadata> {
        match self {
            Self::Metadata(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_mimetype(self) -> Option<MimeType> {
        match self {
            Self::Mimetype(m) => m,
            _ => None,
        }
    }
}

/// Decode `raw` as the response to a `kind` request.
pub fn decode(kind: ExtractionKind, dialect: MetadataDialect, raw: Vec<u8>) -> Result<Extracted> {
    match kind {
        ExtractionKind::Text => decode_text(raw).map(Extracted::Text),
        ExtractionKind::Html => decode_text(raw).map(Extracted::Html),
        ExtractionKind::Metadata => decode_metadata(dialect, &raw).map(Extracted::Metadata),
        ExtractionKind::Mimetype => {
            let metadata = decode_metadata(dialect, &raw)?;
            Ok(Extracted::Mimetype(mimetype_of(&metadata)))
        }
    }
}

pub fn decode_text(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|e| ExtractError::Decode(format!("engine output is not UTF-8: {e}")))
}

pub fn decode_metadata(dialect: MetadataDialect, raw: &[u8]) -> Result<Metadata> {
    match dialect {
        MetadataDialect::Json => parse_json(raw),
        MetadataDialect::Legacy => {
            let text = std::str::from_utf8(raw)
                .map_err(|e| ExtractError::Decode(format!("metadata is not UTF-8: {e}")))?;
            parse_legacy(text)
        }
    }
}

/// Registry entry for the first reported `Content-Type`.
pub fn mimetype_of(metadata: &Metadata) -> Option<MimeType> {
    metadata.content_type().and_then(MimeType::lookup)
}

/// Parsed `Creation-Date`, or `None` when the field is absent.
pub fn creation_date_of(metadata: &Metadata) -> Result<Option<DateTime<FixedOffset>>> {
    metadata.first(CREATION_DATE).map(parse_timestamp).transpose()
}

/// Parse an engine timestamp.
///
/// Accepts RFC 3339, and zone-less date-times or bare dates taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| ExtractError::Decode(format!("invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    #[test]
    fn test_text_is_verbatim() {
        let raw = b"The quick brown fox jumped over the lazy cat.\n".to_vec();
        let out = decode(ExtractionKind::Text, MetadataDialect::Json, raw).unwrap();
        assert_eq!(
            out,
            Extracted::Text("The quick brown fox jumped over the lazy cat.\n".to_string())
        );
    }

    #[test]
    fn test_html_is_verbatim() {
        let raw = b"<html><body><p>hi</p></body></html>".to_vec();
        let out = decode(ExtractionKind::Html, MetadataDialect::Json, raw).unwrap();
        assert_eq!(out.kind(), ExtractionKind::Html);
        assert_eq!(
            out.into_text().as_deref(),
            Some("<html><body><p>hi</p></body></html>")
        );
    }

    #[test]
    fn test_invalid_utf8_text() {
        let out = decode(ExtractionKind::Text, MetadataDialect::Json, vec![0xff, 0xfe]);
        assert!(matches!(out, Err(ExtractError::Decode(_))));
    }

    #[test]
    fn test_mimetype_uses_first_content_type() {
        let raw = format!(r#"{{"Content-Type": ["{DOCX}", "application/zip"]}}"#);
        let mime = decode(ExtractionKind::Mimetype, MetadataDialect::Json, raw.into_bytes())
            .unwrap()
            .into_mimetype()
            .expect("registered type");

        assert_eq!(mime.content_type, DOCX);
        assert!(mime.has_extension("docx"));
    }

    #[test]
    fn test_mimetype_absent_or_unknown() {
        let none = decode(ExtractionKind::Mimetype, MetadataDialect::Json, b"{}".to_vec()).unwrap();
        assert_eq!(none, Extracted::Mimetype(None));

        let unknown = decode(
            ExtractionKind::Mimetype,
            MetadataDialect::Json,
            br#"{"Content-Type": "application/x-unheard-of"}"#.to_vec(),
        )
        .unwrap();
        assert_eq!(unknown, Extracted::Mimetype(None));
    }

    #[test]
    fn test_malformed_metadata_raises() {
        let out = decode(ExtractionKind::Metadata, MetadataDialect::Json, b"Content-Type: x".to_vec());
        assert!(matches!(out, Err(ExtractError::Decode(_))));
    }

    #[test]
    fn test_legacy_metadata_dialect() {
        let raw = b"dc:title: problem: test\nContent-Type: application/msword\n".to_vec();
        let metadata = decode(ExtractionKind::Metadata, MetadataDialect::Legacy, raw)
            .unwrap()
            .into_metadata()
            .unwrap();

        assert_eq!(metadata["dc:title"], "problem: test");
        assert_eq!(metadata.content_type(), Some("application/msword"));
    }

    #[test]
    fn test_creation_date() {
        let mut metadata = Metadata::new();
        assert_eq!(creation_date_of(&metadata).unwrap(), None);

        metadata.insert(CREATION_DATE, MetadataValue::Single("2013-06-28T19:41:27Z".into()));
        let ts = creation_date_of(&metadata).unwrap().expect("date present");
        assert_eq!((ts.year(), ts.month(), ts.day()), (2013, 6, 28));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (19, 41, 27));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2013-06-28T19:41:27+02:00").is_ok());
        assert_eq!(
            parse_timestamp("2013-06-28T19:41:27").unwrap(),
            parse_timestamp("2013-06-28T19:41:27Z").unwrap()
        );
        assert_eq!(parse_timestamp("2013-06-28").unwrap().hour(), 0);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ExtractError::Decode(_))
        ));
    }
}
